//! Decomposed transforms for motion blur.
//!
//! Motion keys are stored as translation, rotation and scale so that
//! interpolation between keys stays rigid. Keys are spread uniformly over
//! the shutter interval `[0, 1]`.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion};

use crate::{Transform, Vec3};

/// An affine transform split into scale, then rotation, then translation.
///
/// Shear is not representable; decomposing a sheared matrix yields the
/// closest rotation-and-scale approximation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecomposedTransform {
    /// Translation component.
    pub translation: Vec3,
    /// Rotation component.
    pub rotation: UnitQuaternion<f32>,
    /// Per-axis scale component.
    pub scale: Vec3,
}

impl DecomposedTransform {
    /// The identity key.
    pub fn identity() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    /// Decompose an affine transform.
    pub fn from_transform(transform: &Transform) -> Self {
        let m = &transform.matrix;
        let linear: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);

        let mut scale = Vec3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        );
        if linear.determinant() < 0.0 {
            scale.x = -scale.x;
        }

        let mut columns = [Vec3::x(), Vec3::y(), Vec3::z()];
        for (axis, column) in columns.iter_mut().enumerate() {
            if scale[axis].abs() > f32::EPSILON {
                *column = linear.column(axis) / scale[axis];
            }
        }
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(
            &Matrix3::from_columns(&columns),
        ));

        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Recompose into a matrix: `T * R * S`.
    pub fn compose(&self) -> Transform {
        let mut matrix = self.rotation.to_homogeneous();
        for axis in 0..3 {
            for row in 0..3 {
                matrix[(row, axis)] *= self.scale[axis];
            }
        }
        matrix[(0, 3)] = self.translation.x;
        matrix[(1, 3)] = self.translation.y;
        matrix[(2, 3)] = self.translation.z;
        Transform { matrix }
    }

    /// Interpolate between two keys: linear for translation and scale,
    /// spherical for rotation.
    pub fn interpolate(&self, other: &DecomposedTransform, t: f32) -> Self {
        let rotation = self
            .rotation
            .try_slerp(&other.rotation, t, 1e-6)
            .unwrap_or_else(|| self.rotation.nlerp(&other.rotation, t));
        Self {
            translation: self.translation.lerp(&other.translation, t),
            rotation,
            scale: self.scale.lerp(&other.scale, t),
        }
    }
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Evaluate a motion key sequence at `time` in `[0, 1]`.
///
/// Returns `None` for an empty sequence. Times outside the shutter are
/// clamped to the first or last key.
pub fn interpolate_motion(keys: &[DecomposedTransform], time: f32) -> Option<Transform> {
    match keys.len() {
        0 => None,
        1 => Some(keys[0].compose()),
        n => {
            let max_step = (n - 1) as f32;
            let scaled = time.clamp(0.0, 1.0) * max_step;
            let step = (scaled as usize).min(n - 2);
            let frac = scaled - step as f32;
            Some(keys[step].interpolate(&keys[step + 1], frac).compose())
        }
    }
}
