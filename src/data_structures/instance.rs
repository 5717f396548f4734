//! Object transforms.
//!
//! An [`Instance`] is the decomposed position/rotation/scale of a scene node. Poses
//! coming from the platform are full matrices, so [`Instance::from_matrix`] splits
//! them back into the three parts.

use cgmath::{InnerSpace, Matrix3, Matrix4, One, Quaternion, Rotation3, Vector3, Zero};

/// Transformation: position, rotation (as quaternion), and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Instance {
    /// Create a new instance with identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::zero(),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Vector3::new(x, y, z).into()
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vector3::new(scale, scale, scale);
        self
    }

    /// Adds `angle` radians of rotation around the local Y axis.
    pub fn rotate_y(&mut self, angle: f32) {
        self.rotation = (self.rotation * Quaternion::from_angle_y(cgmath::Rad(angle))).normalize();
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Decomposes an affine matrix without shear into translation, rotation and scale.
    pub fn from_matrix(matrix: Matrix4<f32>) -> Self {
        let position = matrix.w.truncate();
        let mut x = matrix.x.truncate();
        let y = matrix.y.truncate();
        let z = matrix.z.truncate();
        let mut scale = Vector3::new(x.magnitude(), y.magnitude(), z.magnitude());
        // A mirrored basis is expressed as a negative X scale.
        if x.cross(y).dot(z) < 0.0 {
            scale.x = -scale.x;
            x = -x;
        }
        let axis = |v: Vector3<f32>, s: f32| if s.abs() > f32::EPSILON { v / s.abs() } else { v };
        let basis = Matrix3::from_cols(axis(x, scale.x), axis(y, scale.y), axis(z, scale.z));
        Self {
            position,
            rotation: Quaternion::from(basis).normalize(),
            scale,
        }
    }
}

impl From<Vector3<f32>> for Instance {
    fn from(position: Vector3<f32>) -> Self {
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

#[cfg(test)]
mod tests {
    use cgmath::{Deg, assert_relative_eq};

    use super::*;

    #[test]
    fn matrix_round_trips_through_decomposition() {
        let instance = Instance {
            position: Vector3::new(0.3, -1.0, 2.5),
            rotation: Quaternion::from_axis_angle(Vector3::new(1.0, 1.0, 0.0).normalize(), Deg(40.0)),
            scale: Vector3::new(0.3, 0.3, 0.3),
        };
        let decomposed = Instance::from_matrix(instance.to_matrix());
        assert_relative_eq!(decomposed.to_matrix(), instance.to_matrix(), epsilon = 1e-5);
        assert_relative_eq!(decomposed.scale, instance.scale, epsilon = 1e-5);
        assert_relative_eq!(decomposed.position, instance.position, epsilon = 1e-6);
    }

    #[test]
    fn rotate_y_accumulates() {
        let mut instance = Instance::new();
        instance.rotate_y(0.01);
        instance.rotate_y(0.01);
        let expected = Quaternion::from_angle_y(cgmath::Rad(0.02));
        assert_relative_eq!(instance.rotation, expected, epsilon = 1e-6);
    }

    #[test]
    fn mirrored_matrix_keeps_handedness_in_scale() {
        let mirrored = Matrix4::from_nonuniform_scale(-2.0, 1.0, 1.0);
        let decomposed = Instance::from_matrix(mirrored);
        assert_relative_eq!(decomposed.scale, Vector3::new(-2.0, 1.0, 1.0), epsilon = 1e-6);
        assert_relative_eq!(decomposed.to_matrix(), mirrored, epsilon = 1e-6);
    }
}
