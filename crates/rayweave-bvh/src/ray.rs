//! Ray representation, hit records and self-intersection descriptors.

use bitflags::bitflags;
use rayweave_math::{Point3, Vec3};

use crate::node::PrimitiveKind;

/// Sentinel for "no object".
pub const OBJECT_NONE: u32 = u32::MAX;

/// Sentinel for "no primitive".
pub const PRIM_NONE: u32 = u32::MAX;

bitflags! {
    /// Ray-type visibility bits. A primitive is eligible for a ray when
    /// their masks share at least one bit.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Visibility: u32 {
        /// Camera rays.
        const CAMERA = 1 << 0;
        /// Diffuse bounces.
        const DIFFUSE = 1 << 1;
        /// Glossy bounces.
        const GLOSSY = 1 << 2;
        /// Transmission bounces.
        const TRANSMIT = 1 << 3;
        /// Shadow rays.
        const SHADOW = 1 << 4;
        /// Volume scatter rays.
        const VOLUME_SCATTER = 1 << 5;
        /// Every ray type.
        const ALL = Self::CAMERA.bits()
            | Self::DIFFUSE.bits()
            | Self::GLOSSY.bits()
            | Self::TRANSMIT.bits()
            | Self::SHADOW.bits()
            | Self::VOLUME_SCATTER.bits();
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::ALL
    }
}

/// Identifies the surface a ray starts on, so it is not hit again at `t ≈ 0`.
///
/// Primitive indices are per kind, so a surface is named by object, kind and
/// index together. Shadow rays additionally carry the light they travel
/// towards, which must not occlude itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaySelf {
    /// Object the ray leaves from.
    pub object: u32,
    /// Primitive the ray leaves from.
    pub prim: u32,
    /// Kind of the primitive the ray leaves from.
    pub kind: PrimitiveKind,
    /// Object of the light a shadow ray is aimed at.
    pub light_object: u32,
    /// Primitive of the light a shadow ray is aimed at.
    pub light_prim: u32,
    /// Kind of the light primitive.
    pub light_kind: PrimitiveKind,
}

impl RaySelf {
    /// No exclusion.
    pub const NONE: Self = Self {
        object: OBJECT_NONE,
        prim: PRIM_NONE,
        kind: PrimitiveKind::Triangle,
        light_object: OBJECT_NONE,
        light_prim: PRIM_NONE,
        light_kind: PrimitiveKind::Triangle,
    };

    /// Exclude the primitive of a previous hit.
    pub fn from_hit(hit: &Intersection) -> Self {
        Self {
            object: hit.object,
            prim: hit.prim,
            kind: hit.kind,
            ..Self::NONE
        }
    }

    /// Also exclude the light the ray is aimed at.
    pub fn with_light(mut self, object: u32, kind: PrimitiveKind, prim: u32) -> Self {
        self.light_object = object;
        self.light_kind = kind;
        self.light_prim = prim;
        self
    }

    /// Skip rule for closest-hit and volume queries.
    #[inline]
    pub fn skips(&self, object: u32, kind: PrimitiveKind, prim: u32) -> bool {
        self.prim == prim && self.kind == kind && self.object == object
    }

    /// Skip rule for shadow queries: the origin surface and the target light.
    #[inline]
    pub fn skips_shadow(&self, object: u32, kind: PrimitiveKind, prim: u32) -> bool {
        self.skips(object, kind, prim)
            || (self.light_prim == prim && self.light_kind == kind && self.light_object == object)
    }

    /// Skip rule for local queries, which already run inside one object.
    #[inline]
    pub fn skips_local(&self, kind: PrimitiveKind, prim: u32) -> bool {
        self.prim == prim && self.kind == kind
    }
}

impl Default for RaySelf {
    fn default() -> Self {
        Self::NONE
    }
}

/// A ray query input.
///
/// The direction is not normalized: hit distances are measured in units of
/// its length, which keeps them unchanged when the ray is carried into an
/// instance's object space.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Direction of the ray.
    pub direction: Vec3,
    /// Start of the valid parameter interval.
    pub tmin: f32,
    /// End of the valid parameter interval.
    pub tmax: f32,
    /// Shutter time in `[0, 1]` for motion blur.
    pub time: f32,
    /// Ray-type visibility mask.
    pub visibility: Visibility,
    /// Self-intersection exclusion.
    pub self_hit: RaySelf,
}

impl Ray {
    /// Create a ray over `[0, ∞)` at shutter time zero, visible to everything.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            tmin: 0.0,
            tmax: f32::INFINITY,
            time: 0.0,
            visibility: Visibility::ALL,
            self_hit: RaySelf::NONE,
        }
    }

    /// Restrict the parameter interval.
    pub fn with_range(mut self, tmin: f32, tmax: f32) -> Self {
        self.tmin = tmin;
        self.tmax = tmax;
        self
    }

    /// Set the shutter time.
    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    /// Set the visibility mask.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the self-intersection exclusion.
    pub fn with_self(mut self, self_hit: RaySelf) -> Self {
        self.self_hit = self_hit;
        self
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f32) -> Point3 {
        self.origin + self.direction * t
    }

    /// Whether the ray can be traversed at all.
    ///
    /// Rays with non-finite origin or direction, a zero direction, a NaN
    /// interval or `tmin > tmax` are treated as misses by every query.
    pub fn is_well_formed(&self) -> bool {
        let finite = self.origin.coords.iter().all(|v| v.is_finite())
            && self.direction.iter().all(|v| v.is_finite())
            && self.time.is_finite();
        finite
            && self.direction.norm_squared() > 0.0
            && !self.tmin.is_nan()
            && !self.tmax.is_nan()
            && self.tmin <= self.tmax
    }
}

/// Result of a ray-primitive intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Parameter along the ray where the intersection occurs.
    pub t: f32,
    /// First barycentric or parametric coordinate.
    pub u: f32,
    /// Second barycentric or parametric coordinate.
    pub v: f32,
    /// Primitive index within the buffer of its kind.
    pub prim: u32,
    /// Object the primitive was reached through.
    pub object: u32,
    /// Primitive type.
    pub kind: PrimitiveKind,
}
