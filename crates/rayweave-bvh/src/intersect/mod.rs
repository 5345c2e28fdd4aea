//! Primitive storage and ray-primitive intersection.
//!
//! Every primitive kind owns a buffer in [`Geometry`]; leaves address into
//! those buffers through the scene's `prim_index` array.

pub mod curve;
pub mod motion;
pub mod point;
pub mod triangle;

use rayweave_math::{Aabb3, Point3};

pub use curve::CurveKey;
pub use point::PointPrim;

use crate::error::PrimitiveError;
use crate::features::Features;
use crate::node::PrimitiveKind;
use crate::node_test::SlabRay;

/// A primitive hit before it is tied to an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimHit {
    /// Ray parameter.
    pub t: f32,
    /// First surface coordinate.
    pub u: f32,
    /// Second surface coordinate.
    pub v: f32,
}

/// Kind-specific primitive buffers.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// Static triangle vertices.
    pub vertices: Vec<Point3>,
    /// Static triangles as vertex index triples.
    pub triangles: Vec<[u32; 3]>,
    /// Motion vertex keys, one vector of positions per time step.
    pub motion_vertices: Vec<Vec<Point3>>,
    /// Motion triangles as index triples into each time step.
    pub motion_triangles: Vec<[u32; 3]>,
    /// Curve control points.
    pub curve_keys: Vec<CurveKey>,
    /// Curve segments as pairs of key indices.
    pub curve_segments: Vec<[u32; 2]>,
    /// Point primitives.
    pub points: Vec<PointPrim>,
}

impl Geometry {
    /// Number of primitives of `kind`.
    pub fn count(&self, kind: PrimitiveKind) -> usize {
        match kind {
            PrimitiveKind::Triangle => self.triangles.len(),
            PrimitiveKind::MotionTriangle => self.motion_triangles.len(),
            PrimitiveKind::Curve => self.curve_segments.len(),
            PrimitiveKind::Point => self.points.len(),
            PrimitiveKind::Instance => 0,
        }
    }

    /// Check that primitive `index` of `kind` only references existing storage.
    pub fn check(&self, kind: PrimitiveKind, index: u32) -> Result<(), PrimitiveError> {
        let i = index as usize;
        let count = self.count(kind);
        if i >= count {
            return Err(PrimitiveError::IndexOutOfRange { kind, index, count });
        }
        let missing_vertex = |corners: &[u32; 3], len: usize| {
            corners
                .iter()
                .find(|&&v| v as usize >= len)
                .map(|&vertex| PrimitiveError::MissingVertex { kind, index, vertex })
        };
        match kind {
            PrimitiveKind::Triangle => {
                if let Some(err) = missing_vertex(&self.triangles[i], self.vertices.len()) {
                    return Err(err);
                }
            }
            PrimitiveKind::MotionTriangle => {
                if self.motion_vertices.is_empty() {
                    return Err(PrimitiveError::NoMotionSteps);
                }
                let len = self.motion_vertices.iter().map(Vec::len).min().unwrap_or(0);
                if let Some(err) = missing_vertex(&self.motion_triangles[i], len) {
                    return Err(err);
                }
            }
            PrimitiveKind::Curve => {
                if let Some(&key) =
                    self.curve_segments[i].iter().find(|&&k| k as usize >= self.curve_keys.len())
                {
                    return Err(PrimitiveError::MissingKey { index, key });
                }
            }
            PrimitiveKind::Point | PrimitiveKind::Instance => {}
        }
        Ok(())
    }

    /// Bounds of a primitive over the whole shutter interval.
    pub fn bounds(&self, kind: PrimitiveKind, index: u32) -> Option<Aabb3> {
        let i = index as usize;
        match kind {
            PrimitiveKind::Triangle => {
                let tri = self.triangles.get(i)?;
                let mut b = Aabb3::empty();
                for &v in tri {
                    b.include_point(self.vertices.get(v as usize)?);
                }
                Some(b)
            }
            PrimitiveKind::MotionTriangle => {
                let tri = self.motion_triangles.get(i)?;
                let mut b = Aabb3::empty();
                for step in &self.motion_vertices {
                    for &v in tri {
                        b.include_point(step.get(v as usize)?);
                    }
                }
                Some(b)
            }
            PrimitiveKind::Curve => {
                let [a, c] = *self.curve_segments.get(i)?;
                Some(curve::bounds(
                    self.curve_keys.get(a as usize)?,
                    self.curve_keys.get(c as usize)?,
                ))
            }
            PrimitiveKind::Point => Some(self.points.get(i)?.bounds()),
            PrimitiveKind::Instance => None,
        }
    }

    /// Intersect primitive `index` of `kind`.
    ///
    /// Kinds the feature set `F` does not enable are never hit. Storage has
    /// been validated when the scene was built, so lookups here only guard
    /// against out-of-range indices by missing.
    #[inline]
    pub fn intersect<F: Features>(
        &self,
        kind: PrimitiveKind,
        index: u32,
        ray: &SlabRay,
        time: f32,
    ) -> Option<PrimHit> {
        let i = index as usize;
        match kind {
            PrimitiveKind::Triangle => {
                let [a, b, c] = *self.triangles.get(i)?;
                let verts = [
                    *self.vertices.get(a as usize)?,
                    *self.vertices.get(b as usize)?,
                    *self.vertices.get(c as usize)?,
                ];
                triangle::intersect(&verts, ray)
            }
            PrimitiveKind::MotionTriangle if F::MOTION => {
                motion::intersect(&self.motion_vertices, self.motion_triangles.get(i)?, ray, time)
            }
            PrimitiveKind::Curve if F::HAIR => {
                let [a, b] = *self.curve_segments.get(i)?;
                curve::intersect(
                    self.curve_keys.get(a as usize)?,
                    self.curve_keys.get(b as usize)?,
                    ray,
                )
            }
            PrimitiveKind::Point if F::POINTCLOUD => point::intersect(self.points.get(i)?, ray),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Full, Minimal};
    use rayweave_math::Vec3;

    fn geometry() -> Geometry {
        Geometry {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            triangles: vec![[0, 1, 2], [0, 1, 9]],
            points: vec![PointPrim::new(Point3::new(0.2, 0.2, 0.0), 0.5)],
            ..Default::default()
        }
    }

    #[test]
    fn test_check_catches_missing_vertex() {
        let g = geometry();
        assert!(g.check(PrimitiveKind::Triangle, 0).is_ok());
        assert_eq!(
            g.check(PrimitiveKind::Triangle, 1),
            Err(PrimitiveError::MissingVertex {
                kind: PrimitiveKind::Triangle,
                index: 1,
                vertex: 9
            })
        );
        assert!(matches!(
            g.check(PrimitiveKind::Triangle, 2),
            Err(PrimitiveError::IndexOutOfRange { index: 2, count: 2, .. })
        ));
        assert!(matches!(
            g.check(PrimitiveKind::Curve, 0),
            Err(PrimitiveError::IndexOutOfRange { count: 0, .. })
        ));
    }

    #[test]
    fn test_feature_gating() {
        let g = geometry();
        let ray = SlabRay::new(Point3::new(0.2, 0.2, 2.0), -Vec3::z(), 0.0, f32::INFINITY);
        assert!(g.intersect::<Minimal>(PrimitiveKind::Triangle, 0, &ray, 0.0).is_some());
        assert!(g.intersect::<Minimal>(PrimitiveKind::Point, 0, &ray, 0.0).is_none());
        assert!(g.intersect::<Full>(PrimitiveKind::Point, 0, &ray, 0.0).is_some());
        assert!(g.intersect::<Full>(PrimitiveKind::Triangle, 1, &ray, 0.0).is_none());
    }

    #[test]
    fn test_bounds() {
        let g = geometry();
        let b = g.bounds(PrimitiveKind::Triangle, 0).unwrap();
        assert_eq!(b.max, Point3::new(1.0, 1.0, 0.0));
        assert!(g.bounds(PrimitiveKind::Triangle, 1).is_none());
        assert!(g.bounds(PrimitiveKind::Instance, 0).is_none());
    }
}
