//! Near/far plane selection for the slab test.

use rayweave_math::Vec3;

/// Smallest direction magnitude used when inverting a ray direction.
pub const OOEPS: f32 = 8.67e-19;

/// Component-wise `1 / d`, with near-zero components clamped to `±OOEPS`
/// first so that slab products never evaluate `inf * 0`.
#[inline]
pub fn safe_inverse(d: &Vec3) -> Vec3 {
    let inv = |v: f32| {
        if v.abs() < OOEPS {
            1.0 / OOEPS.copysign(v)
        } else {
            1.0 / v
        }
    };
    Vec3::new(inv(d.x), inv(d.y), inv(d.z))
}

/// Which of the two bound slots a ray enters and leaves through, per axis.
///
/// Slot `0` stores minimum planes, slot `1` maximum planes. A ray heading
/// in the negative direction of an axis enters through the maximum plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearFar {
    /// Entry slot per axis.
    pub near: [usize; 3],
    /// Exit slot per axis.
    pub far: [usize; 3],
}

impl NearFar {
    /// Select slots from the signs of an inverse direction.
    #[inline]
    pub fn from_inv_direction(idir: &Vec3) -> Self {
        let near = [
            usize::from(idir.x < 0.0),
            usize::from(idir.y < 0.0),
            usize::from(idir.z < 0.0),
        ];
        Self {
            near,
            far: [1 - near[0], 1 - near[1], 1 - near[2]],
        }
    }
}
