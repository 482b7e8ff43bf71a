//! Engine data structures: scene graphs, transforms, geometry and materials.
//!
//! This module contains the core data types for scene representation:
//!
//! - `bounds` contains the axis-aligned bounding box used for every measurement
//! - `instance` holds per-node transformation data
//! - `material` contains the PBR parameters the normalizer works on
//! - `mesh` contains vertex positions and cylinder detection
//! - `scene_graph` is the arena-indexed, clone-on-write scene asset

pub mod bounds;
pub mod instance;
pub mod material;
pub mod mesh;
pub mod scene_graph;
