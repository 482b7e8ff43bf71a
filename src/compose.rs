//! Scene composition: chassis and backdrop placement plus the lighting rig
//! and the planes enclosing the showroom.
//!
//! Placement only ever writes [`SceneAsset::root`]; authored node transforms
//! are left alone so wheel mounts measured afterwards see the same hierarchy
//! the asset was authored with.

use cgmath::{EuclideanSpace, InnerSpace, Vector3};

use crate::{
    config::ComposerConfig,
    data_structures::{bounds::Aabb, instance::Instance, scene_graph::SceneAsset},
};

/// Result of placing the chassis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChassisPlacement {
    /// Uniform scale applied on top of the authored size.
    pub scale: f32,
    /// World bounds after placement.
    pub bounds: Aabb,
    /// Correction passes needed after the initial translation.
    pub corrections: usize,
}

/// Scales the chassis, centers it on X/Z and lifts it so its lowest point
/// rests `floor_offset` above the floor.
///
/// Centering is measured after scaling. If the measured centroid still
/// deviates from the origin by more than the tolerance, the translation is
/// corrected again, up to `max_correction_passes` times.
pub fn compose_chassis(chassis: &mut SceneAsset, config: &ComposerConfig) -> ChassisPlacement {
    let scale = config.chassis_scale;
    chassis.root = Instance::uniform(Vector3::new(0.0, 0.0, 0.0), chassis.root.rotation, scale);

    let bounds = chassis.world_bounds();
    if bounds.is_empty() {
        log::warn!("{}: chassis has no geometry to center", chassis.source());
        return ChassisPlacement {
            scale,
            bounds,
            corrections: 0,
        };
    }
    let center = bounds.center();
    chassis.root.position = Vector3::new(-center.x, config.floor_offset - bounds.min.y, -center.z);

    let mut corrections = 0;
    let mut bounds = chassis.world_bounds();
    while corrections < config.max_correction_passes {
        let center = bounds.center();
        let lift = config.floor_offset - bounds.min.y;
        if center.x.abs() <= config.centering_tolerance
            && center.z.abs() <= config.centering_tolerance
            && lift.abs() <= config.centering_tolerance
        {
            break;
        }
        chassis.root.position += Vector3::new(-center.x, lift, -center.z);
        bounds = chassis.world_bounds();
        corrections += 1;
    }
    if corrections > 0 {
        log::debug!("{}: {corrections} centering correction passes", chassis.source());
    }
    log::info!(
        "{}: chassis placed, size {:?}",
        chassis.source(),
        bounds.size()
    );

    ChassisPlacement {
        scale,
        bounds,
        corrections,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackdropPlacement {
    pub scale: f32,
    pub offset: Vector3<f32>,
    /// Placement was derived from the measured bounds instead of the
    /// authored convention.
    pub rederived: bool,
}

/// Places the backdrop with the authored scale and offset, unless its bounds
/// show it was modelled far from its origin or at a very different scale.
/// In that case it is scaled to `backdrop_target_size`, centered on X/Z and
/// its floor put at zero.
pub fn compose_backdrop(backdrop: &mut SceneAsset, config: &ComposerConfig) -> BackdropPlacement {
    let rotation = backdrop.root.rotation;
    backdrop.root = Instance::uniform(Vector3::new(0.0, 0.0, 0.0), rotation, 1.0);
    let raw = backdrop.world_bounds();
    let authored = BackdropPlacement {
        scale: config.backdrop_scale,
        offset: Vector3::from(config.backdrop_offset),
        rederived: false,
    };

    let size = raw.max_dimension();
    let placement = if raw.is_empty() || size <= f32::EPSILON {
        authored
    } else {
        let off_center = raw.center().to_vec().magnitude() > size * config.backdrop_off_center;
        let authored_size = size * config.backdrop_scale;
        let target = config.backdrop_target_size;
        let off_scale = authored_size < target / config.backdrop_scale_ratio
            || authored_size > target * config.backdrop_scale_ratio;
        if off_center || off_scale {
            let scale = target / size;
            let center = raw.center();
            log::info!(
                "{}: backdrop re-derived (off center: {off_center}, off scale: {off_scale})",
                backdrop.source()
            );
            BackdropPlacement {
                scale,
                offset: Vector3::new(-center.x * scale, -raw.min.y * scale, -center.z * scale),
                rederived: true,
            }
        } else {
            authored
        }
    };

    backdrop.root = Instance::uniform(placement.offset, rotation, placement.scale);
    placement
}

#[derive(Clone, Debug, PartialEq)]
pub enum Light {
    Ambient {
        color: [f32; 3],
        intensity: f32,
    },
    Directional {
        color: [f32; 3],
        intensity: f32,
        /// Direction the light travels in.
        direction: Vector3<f32>,
    },
    Point {
        color: [f32; 3],
        intensity: f32,
        position: Vector3<f32>,
        range: f32,
    },
}

/// Even showroom lighting: a soft ambient base, key/fill/rim directionals
/// and two low point lights that reach into the wheel wells.
pub fn environment_lights() -> Vec<Light> {
    let white = [1.0, 1.0, 1.0];
    vec![
        Light::Ambient {
            color: white,
            intensity: 0.6,
        },
        Light::Directional {
            color: white,
            intensity: 1.1,
            direction: Vector3::new(-0.5, -1.0, -0.6).normalize(),
        },
        Light::Directional {
            color: [0.95, 0.97, 1.0],
            intensity: 0.6,
            direction: Vector3::new(0.7, -0.6, 0.4).normalize(),
        },
        Light::Directional {
            color: white,
            intensity: 0.4,
            direction: Vector3::new(0.0, -0.3, 1.0).normalize(),
        },
        Light::Point {
            color: white,
            intensity: 0.5,
            position: Vector3::new(3.0, 0.8, 3.0),
            range: 12.0,
        },
        Light::Point {
            color: white,
            intensity: 0.5,
            position: Vector3::new(-3.0, 0.8, -3.0),
            range: 12.0,
        },
    ]
}

/// A rectangle facing into the showroom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackdropPlane {
    pub center: Vector3<f32>,
    /// Points into the enclosed space.
    pub normal: Vector3<f32>,
    pub width: f32,
    pub height: f32,
    pub color: [f32; 3],
}

/// Floor, ceiling and four walls around the origin, so no camera angle
/// looks out into empty space.
pub fn enclosure(config: &ComposerConfig) -> [BackdropPlane; 6] {
    let e = config.enclosure_extent;
    let color = config.enclosure_color;
    let wall = |center: Vector3<f32>, normal: Vector3<f32>| BackdropPlane {
        center,
        normal,
        width: 2.0 * e,
        height: e,
        color,
    };
    [
        BackdropPlane {
            center: Vector3::new(0.0, 0.0, 0.0),
            normal: Vector3::unit_y(),
            width: 2.0 * e,
            height: 2.0 * e,
            color,
        },
        BackdropPlane {
            center: Vector3::new(0.0, e, 0.0),
            normal: -Vector3::unit_y(),
            width: 2.0 * e,
            height: 2.0 * e,
            color,
        },
        wall(Vector3::new(e, e / 2.0, 0.0), -Vector3::unit_x()),
        wall(Vector3::new(-e, e / 2.0, 0.0), Vector3::unit_x()),
        wall(Vector3::new(0.0, e / 2.0, e), -Vector3::unit_z()),
        wall(Vector3::new(0.0, e / 2.0, -e), Vector3::unit_z()),
    ]
}

/// Everything in the scene that does not come from an asset.
#[derive(Clone, Debug, PartialEq)]
pub struct Environment {
    pub lights: Vec<Light>,
    pub planes: [BackdropPlane; 6],
}

impl Environment {
    pub fn new(config: &ComposerConfig) -> Self {
        Self {
            lights: environment_lights(),
            planes: enclosure(config),
        }
    }
}
