//! Node transformation data.
//!
//! Every scene node carries a local [`Instance`] (translation, rotation and
//! scale relative to its parent). World transforms are obtained by
//! multiplying parent and child instances from the root down.

use std::ops::Mul;

use cgmath::{ElementWise, Matrix4, One, Vector3};

/// Per-node transformation: position, rotation (as quaternion), and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Create a new instance with identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn uniform(position: Vector3<f32>, rotation: cgmath::Quaternion<f32>, scale: f32) -> Self {
        Self {
            position,
            rotation,
            scale: Vector3::new(scale, scale, scale),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    /// `parent * child`: the child's transform expressed in the parent's space.
    ///
    /// Non-uniform parent scale combined with a rotated child cannot be
    /// represented exactly as TRS; the scale is applied per axis which is what
    /// the matrix path does for axis-aligned children.
    fn mul(self, rhs: &'b Instance) -> Self::Output {
        let new_rotation = self.rotation * rhs.rotation;
        let new_scale = self.scale.mul_element_wise(rhs.scale);
        let scaled_rhs_pos = self.scale.mul_element_wise(rhs.position);
        let new_position = self.position + (self.rotation * scaled_rhs_pos);

        Instance {
            position: new_position,
            rotation: new_rotation,
            scale: new_scale,
        }
    }
}

impl Mul<Instance> for Instance {
    type Output = Self;

    fn mul(self, rhs: Instance) -> Self::Output {
        &self * &rhs
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}
