//! fitment-ngin
//!
//! A small engine that fits arbitrary tire models onto the wheel mounts of a
//! vehicle chassis and composes a navigable preview scene around them. It
//! runs natively and in the browser; rendering itself is left to the host,
//! which receives plain scene data (node arenas, materials, transforms,
//! lights) and lifecycle callbacks.
//!
//! High-level modules
//! - `camera`: constrained orbit camera and its mouse input handling
//! - `compose`: chassis/backdrop placement, lighting rig and enclosing planes
//! - `config`: every tunable constant, loadable from JSON
//! - `data_structures`: scene arena, transforms, bounds, meshes and materials
//! - `error`: error taxonomy surfaced to the host
//! - `fitment`: computes tire transforms for each wheel mount
//! - `flow`: session state machine, load generations and host callbacks
//! - `normalize`: tire and chassis material post-processing
//! - `resources`: asset resolution (signed URLs), fetching, glTF parsing, caching
//! - `viewer`: ties the pipeline together for one session per tire
//! - `wheels`: wheel mount detection strategies
//!

pub mod camera;
pub mod compose;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod fitment;
pub mod flow;
pub mod normalize;
pub mod resources;
pub mod viewer;
pub mod wheels;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use winit::event::WindowEvent;
