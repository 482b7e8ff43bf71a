use cgmath::Point3;

use crate::data_structures::bounds::Aabb;

/// Relative tolerance when deciding whether two extents describe the same radius.
const ROUND_TOLERANCE: f32 = 0.12;

/// Explicit cylinder parameters, as authored by primitive-based exporters.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CylinderParams {
    pub radius_top: f32,
    pub radius_bottom: f32,
    #[serde(default)]
    pub height: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Primitive {
    pub positions: Vec<Point3<f32>>,
    pub material: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
    pub cylinder: Option<CylinderParams>,
}

impl Mesh {
    pub fn new(name: &str, primitives: Vec<Primitive>) -> Self {
        Self {
            name: name.to_string(),
            primitives,
            cylinder: None,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = &Point3<f32>> {
        self.primitives.iter().flat_map(|p| p.positions.iter())
    }

    pub fn material_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.primitives.iter().filter_map(|p| p.material)
    }

    pub fn local_bounds(&self) -> Aabb {
        Aabb::from_points(self.positions().copied())
    }

    /// Whether the geometry is a cylinder, either declared or inferred.
    ///
    /// Inference: the local box must have two extents within tolerance of
    /// each other (the diameter), and no vertex may lie farther from the
    /// remaining axis than half that diameter. Boxes fail the second test
    /// because their corners sit at `sqrt(2)` times the half-extent.
    pub fn is_cylindrical(&self) -> bool {
        if let Some(params) = self.cylinder {
            return params.radius_top > 0.0 || params.radius_bottom > 0.0;
        }
        self.inferred_radius().is_some()
    }

    pub fn inferred_radius(&self) -> Option<f32> {
        let bounds = self.local_bounds();
        if bounds.is_empty() {
            return None;
        }
        let size = bounds.size();
        let extents = [size.x, size.y, size.z];
        let center = bounds.center();

        // The axle is the axis whose perpendicular pair of extents match.
        (0..3).find_map(|axle| {
            let (a, b) = match axle {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            let diameter = extents[a].max(extents[b]);
            if diameter <= f32::EPSILON {
                return None;
            }
            if (extents[a] - extents[b]).abs() > diameter * ROUND_TOLERANCE {
                return None;
            }
            let radius = diameter / 2.0;
            let within = self.positions().all(|p| {
                let (pa, pb) = (p[a] - center[a], p[b] - center[b]);
                (pa * pa + pb * pb).sqrt() <= radius * (1.0 + ROUND_TOLERANCE / 2.0)
            });
            within.then_some(radius)
        })
    }
}
