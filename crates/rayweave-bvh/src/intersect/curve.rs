//! Curve segments intersected as camera-facing ribbons.

use rayweave_math::{Aabb3, Point3};

use super::PrimHit;
use crate::node_test::SlabRay;

/// A curve control point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveKey {
    /// Position of the key.
    pub position: Point3,
    /// Ribbon half-width at the key.
    pub radius: f32,
}

impl CurveKey {
    /// Create a key.
    pub fn new(position: Point3, radius: f32) -> Self {
        Self { position, radius }
    }
}

/// Bounds of the segment between two keys, padded by their radii.
pub fn bounds(a: &CurveKey, b: &CurveKey) -> Aabb3 {
    let mut ba = Aabb3::new(a.position, a.position);
    ba.expand(a.radius);
    let mut bb = Aabb3::new(b.position, b.position);
    bb.expand(b.radius);
    ba.union(&bb)
}

/// Intersect the segment `a`-`b`.
///
/// Finds the closest approach between the ray and the segment and accepts
/// it when the distance is within the radius interpolated at that point.
/// `u` is the segment parameter, `v` the distance divided by the radius.
pub fn intersect(a: &CurveKey, b: &CurveKey, ray: &SlabRay) -> Option<PrimHit> {
    let d = ray.dir;
    let e = b.position - a.position;
    let w = ray.origin - a.position;
    let dd = d.dot(&d);
    let de = d.dot(&e);
    let ee = e.dot(&e);
    let dw = d.dot(&w);
    let ew = e.dot(&w);

    let denom = dd * ee - de * de;
    let s = if denom > f32::EPSILON * dd * ee {
        ((dd * ew - de * dw) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let t = (s * de - dw) / dd;
    if t < ray.tmin || t > ray.tmax {
        return None;
    }

    let closest_on_ray = ray.origin + d * t;
    let closest_on_segment = a.position + e * s;
    let dist = (closest_on_ray - closest_on_segment).norm();
    let radius = a.radius + (b.radius - a.radius) * s;
    if radius <= 0.0 || dist > radius {
        return None;
    }
    Some(PrimHit {
        t,
        u: s,
        v: dist / radius,
    })
}
