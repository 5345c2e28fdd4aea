//! Ray-triangle intersection (Möller–Trumbore).

use rayweave_math::Point3;

use super::PrimHit;
use crate::node_test::SlabRay;

/// Intersect a triangle. Both faces are hit.
///
/// `u` and `v` are the barycentric weights of the second and third vertex.
#[inline]
pub fn intersect(verts: &[Point3; 3], ray: &SlabRay) -> Option<PrimHit> {
    let e1 = verts[1] - verts[0];
    let e2 = verts[2] - verts[0];
    let p = ray.dir.cross(&e2);
    let det = e1.dot(&p);
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - verts[0];
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = ray.dir.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv_det;
    if t < ray.tmin || t > ray.tmax {
        return None;
    }
    Some(PrimHit { t, u, v })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rayweave_math::Vec3;

    fn tri() -> [Point3; 3] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_hit_barycentrics() {
        let ray = SlabRay::new(Point3::new(0.25, 0.5, 2.0), -Vec3::z(), 0.0, f32::INFINITY);
        let hit = intersect(&tri(), &ray).unwrap();
        assert_relative_eq!(hit.t, 2.0);
        assert_relative_eq!(hit.u, 0.25);
        assert_relative_eq!(hit.v, 0.5);
    }

    #[test]
    fn test_back_face_hit() {
        let ray = SlabRay::new(Point3::new(0.2, 0.2, -1.0), Vec3::z(), 0.0, f32::INFINITY);
        assert!(intersect(&tri(), &ray).is_some());
    }

    #[test]
    fn test_unnormalized_direction_scales_t() {
        let ray = SlabRay::new(Point3::new(0.2, 0.2, 4.0), Vec3::new(0.0, 0.0, -2.0), 0.0, f32::INFINITY);
        assert_relative_eq!(intersect(&tri(), &ray).unwrap().t, 2.0);
    }

    #[test]
    fn test_miss_and_interval() {
        let outside = SlabRay::new(Point3::new(0.8, 0.8, 1.0), -Vec3::z(), 0.0, f32::INFINITY);
        assert!(intersect(&tri(), &outside).is_none());
        let parallel = SlabRay::new(Point3::new(0.2, 0.2, 1.0), Vec3::x(), 0.0, f32::INFINITY);
        assert!(intersect(&tri(), &parallel).is_none());
        let short = SlabRay::new(Point3::new(0.2, 0.2, 1.0), -Vec3::z(), 0.0, 0.5);
        assert!(intersect(&tri(), &short).is_none());
        let behind = SlabRay::new(Point3::new(0.2, 0.2, 1.0), Vec3::z(), 0.0, f32::INFINITY);
        assert!(intersect(&tri(), &behind).is_none());
    }

    #[test]
    fn test_interval_is_closed() {
        let ray = SlabRay::new(Point3::new(0.2, 0.2, 1.0), -Vec3::z(), 1.0, 1.0);
        assert!(intersect(&tri(), &ray).is_some());
    }
}
