//! Points intersected as spheres.

use rayweave_math::{Aabb3, Point3};

use super::PrimHit;
use crate::node_test::SlabRay;

/// A point primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPrim {
    /// Sphere centre.
    pub center: Point3,
    /// Sphere radius.
    pub radius: f32,
}

impl PointPrim {
    /// Create a point.
    pub fn new(center: Point3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Bounding box of the sphere.
    pub fn bounds(&self) -> Aabb3 {
        let mut b = Aabb3::new(self.center, self.center);
        b.expand(self.radius);
        b
    }
}

/// Intersect the sphere, returning the first root inside the ray interval.
pub fn intersect(point: &PointPrim, ray: &SlabRay) -> Option<PrimHit> {
    let oc = ray.origin - point.center;
    let a = ray.dir.dot(&ray.dir);
    let half_b = oc.dot(&ray.dir);
    let c = oc.dot(&oc) - point.radius * point.radius;
    let disc = half_b * half_b - a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    for t in [(-half_b - sq) / a, (-half_b + sq) / a] {
        if t >= ray.tmin && t <= ray.tmax {
            return Some(PrimHit { t, u: 0.0, v: 0.0 });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rayweave_math::Vec3;

    #[test]
    fn test_front_hit() {
        let p = PointPrim::new(Point3::new(0.0, 0.0, -5.0), 1.0);
        let ray = SlabRay::new(Point3::origin(), -Vec3::z(), 0.0, f32::INFINITY);
        assert_relative_eq!(intersect(&p, &ray).unwrap().t, 4.0);
    }

    #[test]
    fn test_inside_hits_far_side() {
        let p = PointPrim::new(Point3::origin(), 2.0);
        let ray = SlabRay::new(Point3::origin(), Vec3::x(), 0.0, f32::INFINITY);
        assert_relative_eq!(intersect(&p, &ray).unwrap().t, 2.0);
    }

    #[test]
    fn test_miss() {
        let p = PointPrim::new(Point3::new(3.0, 0.0, -5.0), 1.0);
        let ray = SlabRay::new(Point3::origin(), -Vec3::z(), 0.0, f32::INFINITY);
        assert!(intersect(&p, &ray).is_none());
        assert_relative_eq!(p.bounds().min.x, 2.0);
    }
}
