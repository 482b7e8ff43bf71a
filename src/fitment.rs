//! Tire placement onto wheel mounts.
//!
//! Tire models are authored lying flat around their own (often off-center)
//! pivot and at arbitrary scale. Fitting one onto a mount means:
//!
//! 1. scale it so its diameter is a fixed fraction of the wheel's,
//! 2. stand it up with a 90° turn about X, then apply the mount's rotation,
//! 3. measure where the transformed geometry ended up and translate it so
//!    its center lands on the mount, plus small configurable nudges.
//!
//! [`fit_tire`] is a pure function of its inputs, so refitting the same mount
//! with the same template yields bit-identical transforms.

use cgmath::{Deg, Quaternion, Rotation3, Vector3};

use crate::{
    config::FitmentConfig,
    data_structures::{instance::Instance, scene_graph::SceneAsset},
    wheels::WheelMount,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitmentTransform {
    pub scale: f32,
    /// Full rotation applied to the tire: the mount's rotation after the
    /// fixed stand-up correction.
    pub rotation_correction: Quaternion<f32>,
    pub position: Vector3<f32>,
}

impl FitmentTransform {
    pub fn to_instance(&self) -> Instance {
        Instance::uniform(self.position, self.rotation_correction, self.scale)
    }
}

/// A placed copy of the tire template.
#[derive(Clone, Debug)]
pub struct TireInstance {
    pub asset: SceneAsset,
    pub transform: FitmentTransform,
    pub mount: usize,
}

/// Rotation that stands a flat-authored tire upright.
pub fn stand_up() -> Quaternion<f32> {
    Quaternion::from_angle_x(Deg(90.0))
}

/// Fits a copy of `tire` onto `mount`.
///
/// `chassis` is the composed chassis the mount was detected on and
/// `chassis_scale` the uniform scale the composer applied to it; nudges are
/// authored in unscaled chassis units.
pub fn fit_tire(
    mount: &WheelMount,
    mount_index: usize,
    chassis: &SceneAsset,
    tire: &SceneAsset,
    chassis_scale: f32,
    config: &FitmentConfig,
) -> TireInstance {
    let mut asset = tire.clone();
    asset.root = Instance::default();
    let tire_diameter = asset.world_bounds().max_dimension();

    let wheel_diameter = match mount.source {
        Some(source) => chassis.subtree_bounds(source).max_dimension(),
        None => {
            let size = chassis.world_bounds().size();
            size.x.max(size.z) * config.synthetic_diameter_fraction
        }
    };

    let mut scale = if tire_diameter > f32::EPSILON {
        wheel_diameter * config.under_fit / tire_diameter
    } else {
        log::warn!("{}: tire has no measurable geometry", tire.source());
        1.0
    };
    scale = match mount.source {
        Some(_) => scale.clamp(config.min_scale, config.max_scale),
        None => scale.clamp(config.synthetic_min_scale, config.synthetic_max_scale),
    };

    let rotation = mount.rotation * stand_up();
    asset.root = Instance::uniform(Vector3::new(0.0, 0.0, 0.0), rotation, scale);

    if mount.source.is_some() {
        // The mount rotation changes the measured box; land on the under-fit
        // target from either side.
        let measured = asset.world_bounds().max_dimension();
        let target = wheel_diameter * config.under_fit;
        if measured > f32::EPSILON && (measured - target).abs() > 1e-4 * wheel_diameter {
            scale = (scale * target / measured).clamp(config.min_scale, config.max_scale);
            asset.root = Instance::uniform(Vector3::new(0.0, 0.0, 0.0), rotation, scale);
        }
    }

    let center = asset.world_bounds().center();
    let centroid = Vector3::new(center.x, center.y, center.z);
    let nudge = Vector3::unit_y() * (config.vertical_nudge * chassis_scale)
        + mount.outward * (config.lateral_nudge * chassis_scale);
    let position = mount.position - centroid + nudge;

    let transform = FitmentTransform {
        scale,
        rotation_correction: rotation,
        position,
    };
    asset.root = transform.to_instance();
    log::debug!(
        "{}: mount {mount_index} wheel {wheel_diameter:.3} tire {tire_diameter:.3} scale {scale:.3}",
        tire.source()
    );

    TireInstance {
        asset,
        transform,
        mount: mount_index,
    }
}

/// Fits one tire copy per mount.
pub fn fit_all(
    mounts: &[WheelMount],
    chassis: &SceneAsset,
    tire: &SceneAsset,
    chassis_scale: f32,
    config: &FitmentConfig,
) -> Vec<TireInstance> {
    mounts
        .iter()
        .enumerate()
        .map(|(idx, mount)| fit_tire(mount, idx, chassis, tire, chassis_scale, config))
        .collect()
}
