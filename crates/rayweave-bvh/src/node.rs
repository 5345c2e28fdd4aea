//! Hierarchy records: child references, internal nodes and leaves.

use rayweave_math::{Aabb3, Point3, Transform, Vec3};

use crate::lanes::LaneWidth;
use crate::ray::Visibility;

/// Reference to a child: another internal node or a leaf.
///
/// The packed form is a signed 32-bit integer: non-negative values are
/// internal node indices, negative values are `!leaf_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Index into the internal node array.
    Internal(u32),
    /// Index into the leaf array.
    Leaf(u32),
}

impl NodeRef {
    /// Encode into the packed signed form.
    #[inline]
    pub fn encode(self) -> i32 {
        match self {
            NodeRef::Internal(index) => index as i32,
            NodeRef::Leaf(index) => !(index as i32),
        }
    }

    /// Decode the packed signed form.
    #[inline]
    pub fn decode(raw: i32) -> Self {
        if raw < 0 {
            NodeRef::Leaf(!raw as u32)
        } else {
            NodeRef::Internal(raw as u32)
        }
    }

    /// Whether this references a leaf.
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeRef::Leaf(_))
    }
}

/// Primitive type tag of a leaf and of a hit.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Static triangle.
    Triangle = 0,
    /// Triangle with per-vertex motion keys.
    MotionTriangle = 1,
    /// Curve segment rendered as a ribbon.
    Curve = 2,
    /// Point rendered as a sphere.
    Point = 3,
    /// Object instance; the leaf range holds an object index.
    Instance = 4,
}

impl PrimitiveKind {
    /// Decode a packed tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Triangle),
            1 => Some(Self::MotionTriangle),
            2 => Some(Self::Curve),
            3 => Some(Self::Point),
            4 => Some(Self::Instance),
            _ => None,
        }
    }
}

/// A leaf: a range of primitive addresses sharing one type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafNode {
    /// First primitive address (object index for instance leaves).
    pub start: u32,
    /// One past the last primitive address.
    pub end: u32,
    /// Union of the visibility of everything below.
    pub visibility: Visibility,
    /// Primitive type of the whole range.
    pub kind: PrimitiveKind,
}

impl LeafNode {
    /// Leaf over primitive addresses `start..end`.
    pub fn primitives(kind: PrimitiveKind, start: u32, end: u32, visibility: Visibility) -> Self {
        Self {
            start,
            end,
            visibility,
            kind,
        }
    }

    /// Leaf entering `object`.
    pub fn instance(object: u32, visibility: Visibility) -> Self {
        Self {
            start: object,
            end: object + 1,
            visibility,
            kind: PrimitiveKind::Instance,
        }
    }
}

/// Affine map from ray space into the canonical box `[0, 1]^3`, used by
/// unaligned nodes to bound primitives that are poorly served by axis boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSpace {
    /// Upper 3x4 block of the map, row-major.
    pub rows: [[f32; 4]; 3],
}

impl UnitSpace {
    /// Identity map: the child box is `[0, 1]^3` itself.
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    /// Map that sends `bounds` onto the unit box.
    pub fn from_aabb(bounds: &Aabb3) -> Self {
        Self::from_frame(&[Vec3::x(), Vec3::y(), Vec3::z()], bounds)
    }

    /// Map for an orthonormal `frame` (its rows become the box axes) and the
    /// primitive bounds expressed in that frame.
    pub fn from_frame(frame: &[Vec3; 3], local_bounds: &Aabb3) -> Self {
        let extent = local_bounds.extent();
        let mut rows = [[0.0; 4]; 3];
        for (axis, row) in rows.iter_mut().enumerate() {
            let inv = if extent[axis] > 0.0 {
                1.0 / extent[axis]
            } else {
                // Flat along this axis; any large scale keeps the slab thin.
                1.0 / f32::EPSILON
            };
            row[0] = frame[axis].x * inv;
            row[1] = frame[axis].y * inv;
            row[2] = frame[axis].z * inv;
            row[3] = -local_bounds.min[axis] * inv;
        }
        Self { rows }
    }

    /// Wrap an arbitrary affine transform.
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            rows: transform.to_rows(),
        }
    }

    /// Map a point.
    #[inline]
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let r = &self.rows;
        Point3::new(
            r[0][0] * p.x + r[0][1] * p.y + r[0][2] * p.z + r[0][3],
            r[1][0] * p.x + r[1][1] * p.y + r[1][2] * p.z + r[1][3],
            r[2][0] * p.x + r[2][1] * p.y + r[2][2] * p.z + r[2][3],
        )
    }

    /// Map a direction, without renormalizing.
    #[inline]
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = &self.rows;
        Vec3::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }
}

impl Default for UnitSpace {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Child bounding data of an internal node.
#[derive(Debug, Clone)]
pub enum NodeBounds<W: LaneWidth> {
    /// Axis-aligned boxes. `slots[0][axis]` holds the minimum planes and
    /// `slots[1][axis]` the maximum planes of every child, one lane each.
    Aligned {
        /// Packed planes, indexed `[slot][axis][child]`.
        slots: [[W::Floats; 3]; 2],
    },
    /// One unit-box space per child.
    Unaligned {
        /// Per-child spaces.
        spaces: W::Spaces,
    },
}

/// An internal node with up to `W::WIDTH` children.
#[derive(Debug, Clone)]
pub struct Node<W: LaneWidth> {
    /// Child bounds.
    pub bounds: NodeBounds<W>,
    /// Child references; only the first `child_count` are meaningful.
    pub children: W::Refs,
    /// Per-child visibility bits.
    pub visibility: W::Masks,
    /// Number of populated child slots.
    pub child_count: u8,
}

impl<W: LaneWidth> Node<W> {
    /// Node with axis-aligned child boxes.
    ///
    /// # Panics
    ///
    /// Panics if more than `W::WIDTH` children are given.
    pub fn aligned(children: &[(NodeRef, Aabb3, Visibility)]) -> Self {
        assert!(children.len() <= W::WIDTH, "too many children for node width");
        let empty = Aabb3::empty();
        let mut slots = [[W::Floats::default(); 3]; 2];
        for lane in 0..W::WIDTH {
            let bounds = children.get(lane).map_or(&empty, |c| &c.1);
            for axis in 0..3 {
                slots[0][axis].as_mut()[lane] = bounds.min[axis];
                slots[1][axis].as_mut()[lane] = bounds.max[axis];
            }
        }
        Self::with_bounds(NodeBounds::Aligned { slots }, children.iter().map(|c| (c.0, c.2)))
    }

    /// Node with one unit-box space per child.
    ///
    /// # Panics
    ///
    /// Panics if more than `W::WIDTH` children are given.
    pub fn unaligned(children: &[(NodeRef, UnitSpace, Visibility)]) -> Self {
        assert!(children.len() <= W::WIDTH, "too many children for node width");
        let mut spaces = W::Spaces::default();
        for (lane, child) in children.iter().enumerate() {
            spaces.as_mut()[lane] = child.1;
        }
        Self::with_bounds(NodeBounds::Unaligned { spaces }, children.iter().map(|c| (c.0, c.2)))
    }

    fn with_bounds(
        bounds: NodeBounds<W>,
        children: impl ExactSizeIterator<Item = (NodeRef, Visibility)>,
    ) -> Self {
        let child_count = children.len() as u8;
        let mut refs = W::empty_refs();
        let mut visibility = W::Masks::default();
        for (lane, (child, vis)) in children.enumerate() {
            refs.as_mut()[lane] = child;
            visibility.as_mut()[lane] = vis.bits();
        }
        Self {
            bounds,
            children: refs,
            visibility,
            child_count,
        }
    }

    /// The populated child references.
    pub fn child_refs(&self) -> &[NodeRef] {
        let count = (self.child_count as usize).min(W::WIDTH);
        &self.children.as_ref()[..count]
    }

    /// Whether this node uses unit-box spaces.
    pub fn is_unaligned(&self) -> bool {
        matches!(self.bounds, NodeBounds::Unaligned { .. })
    }

    /// Bit mask of populated children whose visibility matches `visibility`.
    #[inline]
    pub(crate) fn visible_mask(&self, visibility: Visibility) -> u32 {
        let mut mask = 0;
        let masks = self.visibility.as_ref();
        for lane in 0..(self.child_count as usize).min(W::WIDTH) {
            if masks[lane] & visibility.bits() != 0 {
                mask |= 1 << lane;
            }
        }
        mask
    }
}
