//! Triangles with per-vertex motion keys.

use rayweave_math::Point3;

use super::{triangle, PrimHit};
use crate::node_test::SlabRay;

/// Vertex position at `time` from keys spread evenly over `[0, 1]`.
pub fn vertex_at(keys: &[Vec<Point3>], vertex: usize, time: f32) -> Option<Point3> {
    match keys.len() {
        0 => None,
        1 => keys[0].get(vertex).copied(),
        n => {
            let pos = time.clamp(0.0, 1.0) * (n - 1) as f32;
            let step = (pos.floor() as usize).min(n - 2);
            let frac = pos - step as f32;
            let a = keys[step].get(vertex)?;
            let b = keys[step + 1].get(vertex)?;
            Some(a + (b - a) * frac)
        }
    }
}

/// Intersect a motion triangle at the ray's shutter time.
pub fn intersect(
    keys: &[Vec<Point3>],
    indices: &[u32; 3],
    ray: &SlabRay,
    time: f32,
) -> Option<PrimHit> {
    let verts = [
        vertex_at(keys, indices[0] as usize, time)?,
        vertex_at(keys, indices[1] as usize, time)?,
        vertex_at(keys, indices[2] as usize, time)?,
    ];
    triangle::intersect(&verts, ray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rayweave_math::Vec3;

    fn keys() -> Vec<Vec<Point3>> {
        let base = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let shift = Vec3::new(2.0, 0.0, 0.0);
        vec![
            base.to_vec(),
            base.iter().map(|p| p + shift).collect(),
            base.iter().map(|p| p + shift * 2.0).collect(),
        ]
    }

    #[test]
    fn test_vertex_interpolation() {
        let keys = keys();
        assert_relative_eq!(vertex_at(&keys, 0, 0.0).unwrap().x, 0.0);
        assert_relative_eq!(vertex_at(&keys, 0, 0.25).unwrap().x, 1.0);
        assert_relative_eq!(vertex_at(&keys, 0, 1.0).unwrap().x, 4.0);
        assert!(vertex_at(&keys, 7, 0.5).is_none());
    }

    #[test]
    fn test_hit_depends_on_time() {
        let keys = keys();
        let ray = SlabRay::new(Point3::new(0.2, 0.2, 1.0), -Vec3::z(), 0.0, f32::INFINITY);
        assert!(intersect(&keys, &[0, 1, 2], &ray, 0.0).is_some());
        assert!(intersect(&keys, &[0, 1, 2], &ray, 1.0).is_none());
        let moved = SlabRay::new(Point3::new(4.2, 0.2, 1.0), -Vec3::z(), 0.0, f32::INFINITY);
        assert!(intersect(&keys, &[0, 1, 2], &moved, 1.0).is_some());
    }
}
