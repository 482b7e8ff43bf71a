//! Wheel mount detection on a chassis scene.
//!
//! Detection is a chain of independent strategies, each a pure function of
//! the chassis scene. The first one to produce a non-empty mount list wins:
//!
//! 1. [`NameMatch`] looks for wheel-related node names.
//! 2. [`GeometryMatch`] looks for wheel-sized cylinders near the ground.
//! 3. [`SyntheticFallback`] derives four mounts from the chassis bounds and
//!    always succeeds.
//!
//! Nodes backing a detected mount are hidden afterwards (never removed) so
//! the fitted tire replaces them visually while their geometry stays
//! measurable.

use cgmath::{One, Quaternion, Vector3};

use crate::{
    config::LocatorConfig,
    data_structures::{
        bounds::Aabb,
        scene_graph::{NodeId, SceneAsset},
    },
};

/// Short tokens (e.g. "fl", "rim") only match whole words, longer ones match
/// anywhere in the name.
const WHOLE_WORD_MAX_LEN: usize = 3;

/// Where a tire should go.
#[derive(Clone, Debug, PartialEq)]
pub struct WheelMount {
    /// World-space center of the wheel.
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
    /// Unit vector pointing away from the chassis along its short axis.
    pub outward: Vector3<f32>,
    /// The chassis node this mount was detected on; `None` for synthetic mounts.
    pub source: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detection {
    Name,
    Geometry,
    Synthetic,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WheelDetection {
    pub mounts: Vec<WheelMount>,
    pub method: Detection,
}

pub trait WheelStrategy {
    fn method(&self) -> Detection;

    /// `None` when nothing was found; never `Some(vec![])`.
    fn locate(&self, chassis: &SceneAsset) -> Option<Vec<WheelMount>>;
}

fn words(name: &str) -> impl Iterator<Item = String> + '_ {
    name.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_lowercase())
}

fn name_matches(name: &str, tokens: &[String]) -> bool {
    let lower = name.to_ascii_lowercase();
    tokens.iter().any(|token| {
        if token.len() <= WHOLE_WORD_MAX_LEN {
            words(name).any(|word| word == *token)
        } else {
            lower.contains(token.as_str())
        }
    })
}

/// Outward direction for a point, along the chassis's shorter horizontal axis.
fn outward_for(position: Vector3<f32>, chassis: &Aabb) -> Vector3<f32> {
    let size = chassis.size();
    let center = chassis.center();
    if size.x <= size.z {
        let sign = if position.x < center.x { -1.0 } else { 1.0 };
        Vector3::new(sign, 0.0, 0.0)
    } else {
        let sign = if position.z < center.z { -1.0 } else { 1.0 };
        Vector3::new(0.0, 0.0, sign)
    }
}

fn mount_for(chassis: &SceneAsset, id: NodeId, bounds: &Aabb) -> WheelMount {
    let world = chassis.world_transform(id);
    let center = chassis.world_center(id);
    let position = Vector3::new(center.x, center.y, center.z);
    WheelMount {
        position,
        rotation: world.rotation,
        scale: world.scale,
        outward: outward_for(position, bounds),
        source: Some(id),
    }
}

/// Name heuristic: a node is a wheel if its own or its parent's name carries
/// a wheel token.
pub struct NameMatch<'a> {
    pub config: &'a LocatorConfig,
}

impl NameMatch<'_> {
    fn is_container(&self, chassis: &SceneAsset, id: NodeId) -> bool {
        chassis.node(id).is_some_and(|node| {
            !node.children.is_empty() && name_matches(&node.name, &self.config.container_tokens)
        })
    }

    fn is_candidate(&self, chassis: &SceneAsset, id: NodeId) -> bool {
        let Some(node) = chassis.node(id) else {
            return false;
        };
        name_matches(&node.name, &self.config.wheel_tokens)
            || chassis
                .parent_of(id)
                .is_some_and(|parent| name_matches(&parent.name, &self.config.wheel_tokens))
    }
}

impl WheelStrategy for NameMatch<'_> {
    fn method(&self) -> Detection {
        Detection::Name
    }

    fn locate(&self, chassis: &SceneAsset) -> Option<Vec<WheelMount>> {
        let mut recorded: Vec<NodeId> = Vec::new();
        for id in chassis.traverse() {
            if !self.is_candidate(chassis, id) || self.is_container(chassis, id) {
                continue;
            }
            // A wheel group and its parts are one wheel.
            if recorded
                .iter()
                .any(|&wheel| chassis.is_descendant_of(id, wheel))
            {
                continue;
            }
            // Nothing to measure or place against.
            if chassis.subtree_bounds(id).is_empty() {
                log::debug!("skipping wheel-named node {id:?} without geometry");
                continue;
            }
            recorded.push(id);
        }
        if recorded.is_empty() {
            return None;
        }
        let bounds = chassis.world_bounds();
        Some(
            recorded
                .into_iter()
                .map(|id| mount_for(chassis, id, &bounds))
                .collect(),
        )
    }
}

/// Geometry heuristic: wheel-sized, disc-shaped cylinders resting low on the
/// chassis.
pub struct GeometryMatch<'a> {
    pub config: &'a LocatorConfig,
}

impl GeometryMatch<'_> {
    fn qualifies(&self, chassis: &SceneAsset, id: NodeId, chassis_bounds: &Aabb) -> bool {
        let Some(mesh) = chassis.node(id).and_then(|node| node.mesh.as_ref()) else {
            return false;
        };
        if !mesh.is_cylindrical() {
            return false;
        }
        let bounds = chassis.subtree_bounds(id);
        let diameter = bounds.max_dimension();
        if diameter < self.config.min_wheel_diameter || diameter > self.config.max_wheel_diameter {
            return false;
        }
        let thinnest = bounds.min_dimension();
        if thinnest <= f32::EPSILON {
            return false;
        }
        let aspect = diameter / thinnest;
        if aspect < self.config.min_aspect || aspect > self.config.max_aspect {
            return false;
        }
        let y = bounds.center().y;
        let ceiling = chassis_bounds.min.y + chassis_bounds.size().y * self.config.ground_band;
        y < chassis_bounds.center().y && y <= ceiling
    }
}

impl WheelStrategy for GeometryMatch<'_> {
    fn method(&self) -> Detection {
        Detection::Geometry
    }

    fn locate(&self, chassis: &SceneAsset) -> Option<Vec<WheelMount>> {
        let bounds = chassis.world_bounds();
        let mounts: Vec<WheelMount> = chassis
            .traverse()
            .into_iter()
            .filter(|&id| self.qualifies(chassis, id, &bounds))
            .map(|id| mount_for(chassis, id, &bounds))
            .collect();
        (!mounts.is_empty()).then_some(mounts)
    }
}

/// Four mounts computed from the chassis bounds alone.
pub struct SyntheticFallback<'a> {
    pub config: &'a LocatorConfig,
}

impl WheelStrategy for SyntheticFallback<'_> {
    fn method(&self) -> Detection {
        Detection::Synthetic
    }

    fn locate(&self, chassis: &SceneAsset) -> Option<Vec<WheelMount>> {
        let bounds = chassis.world_bounds();
        let (center, size) = if bounds.is_empty() {
            (cgmath::Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0))
        } else {
            (bounds.center(), bounds.size())
        };
        let long_is_x = size.x >= size.z;
        let (length, width) = if long_is_x {
            (size.x, size.z)
        } else {
            (size.z, size.x)
        };
        let axle = length * self.config.axle_offset;
        let track = width * self.config.track_offset;
        let radius = length * self.config.wheel_diameter_fraction / 2.0;
        let y = center.y - size.y / 2.0 + radius;

        let mounts = [(axle, track), (axle, -track), (-axle, track), (-axle, -track)]
            .into_iter()
            .map(|(along, across)| {
                let (position, outward) = if long_is_x {
                    (
                        Vector3::new(center.x + along, y, center.z + across),
                        Vector3::new(0.0, 0.0, across.signum()),
                    )
                } else {
                    (
                        Vector3::new(center.x + across, y, center.z + along),
                        Vector3::new(across.signum(), 0.0, 0.0),
                    )
                };
                WheelMount {
                    position,
                    rotation: Quaternion::one(),
                    scale: Vector3::new(1.0, 1.0, 1.0),
                    outward,
                    source: None,
                }
            })
            .collect();
        Some(mounts)
    }
}

/// Runs the strategy chain without touching the scene.
pub fn detect_wheels(chassis: &SceneAsset, config: &LocatorConfig) -> WheelDetection {
    let strategies: [&dyn WheelStrategy; 3] = [
        &NameMatch { config },
        &GeometryMatch { config },
        &SyntheticFallback { config },
    ];
    for strategy in strategies {
        if let Some(mounts) = strategy.locate(chassis).filter(|m| !m.is_empty()) {
            let method = strategy.method();
            if method != Detection::Name {
                log::warn!(
                    "{}: wheel detection fell back to {method:?} ({} mounts)",
                    chassis.source(),
                    mounts.len()
                );
            } else {
                log::info!("{}: found {} named wheels", chassis.source(), mounts.len());
            }
            return WheelDetection { mounts, method };
        }
    }
    // SyntheticFallback always yields four mounts.
    WheelDetection {
        mounts: Vec::new(),
        method: Detection::Synthetic,
    }
}

/// Detects wheels and hides the chassis nodes they were detected on.
pub fn locate_wheels(chassis: &mut SceneAsset, config: &LocatorConfig) -> WheelDetection {
    let detection = detect_wheels(chassis, config);
    for source in detection.mounts.iter().filter_map(|mount| mount.source) {
        chassis.set_visible(source, false);
    }
    detection
}
