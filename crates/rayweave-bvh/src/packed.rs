//! Flat binary layout for 2-wide hierarchies.
//!
//! Nodes and leaves are plain `#[repr(C)]` records that can be written to
//! and read from byte buffers directly. Child references use the signed
//! encoding of [`NodeRef::encode`].

use bytemuck::{Pod, Zeroable};

use crate::error::SceneError;
use crate::intersect::Geometry;
use crate::lanes::Binary;
use crate::node::{LeafNode, Node, NodeBounds, NodeRef, PrimitiveKind, UnitSpace};
use crate::ray::Visibility;
use crate::scene::{ObjectRecord, PrimitiveArrays, Scene, SceneParts, ShaderRecord};

/// Node tag for axis-aligned child boxes.
pub const NODE_ALIGNED: u32 = 0;

/// Node tag for unit-box child spaces.
pub const NODE_UNALIGNED: u32 = 1;

/// Packed internal node.
///
/// Aligned nodes store `bounds[slot * 6 + axis * 2 + child]` with slot 0
/// the minimum and slot 1 the maximum planes. Unaligned nodes store the
/// 3x4 map of child `c` at `bounds[c * 12..c * 12 + 12]`, row-major.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PackedNode {
    /// Child bounds or spaces.
    pub bounds: [f32; 24],
    /// Signed child references.
    pub children: [i32; 2],
    /// Child visibility bits.
    pub visibility: [u32; 2],
    /// [`NODE_ALIGNED`] or [`NODE_UNALIGNED`].
    pub kind: u32,
    /// Number of populated children.
    pub child_count: u32,
}

/// Packed leaf.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct PackedLeaf {
    /// First primitive address, or the object of an instance leaf.
    pub start: u32,
    /// One past the last primitive address.
    pub end: u32,
    /// Visibility bits.
    pub visibility: u32,
    /// Primitive type tag.
    pub kind: u32,
}

/// The hierarchy part of a 2-wide scene in packed form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackedHierarchy {
    /// Signed root reference.
    pub root: i32,
    /// Internal nodes.
    pub nodes: Vec<PackedNode>,
    /// Leaves.
    pub leaves: Vec<PackedLeaf>,
}

impl PackedHierarchy {
    /// Node records as bytes.
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Leaf records as bytes.
    pub fn leaf_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.leaves)
    }

    /// Read records from byte buffers of any alignment.
    pub fn from_bytes(root: i32, nodes: &[u8], leaves: &[u8]) -> Result<Self, SceneError> {
        Ok(Self {
            root,
            nodes: read_records(nodes, "node")?,
            leaves: read_records(leaves, "leaf")?,
        })
    }
}

fn read_records<T: Pod>(bytes: &[u8], what: &str) -> Result<Vec<T>, SceneError> {
    let size = std::mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(SceneError::Packed(format!(
            "{what} buffer of {} bytes is not a multiple of {size}",
            bytes.len()
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

impl From<&Node<Binary>> for PackedNode {
    fn from(node: &Node<Binary>) -> Self {
        let mut bounds = [0.0; 24];
        let kind = match &node.bounds {
            NodeBounds::Aligned { slots } => {
                for (slot, axes) in slots.iter().enumerate() {
                    for (axis, lanes) in axes.iter().enumerate() {
                        for (child, plane) in lanes.iter().enumerate() {
                            bounds[slot * 6 + axis * 2 + child] = *plane;
                        }
                    }
                }
                NODE_ALIGNED
            }
            NodeBounds::Unaligned { spaces } => {
                for (child, space) in spaces.iter().enumerate() {
                    for (row, values) in space.rows.iter().enumerate() {
                        bounds[child * 12 + row * 4..child * 12 + row * 4 + 4].copy_from_slice(values);
                    }
                }
                NODE_UNALIGNED
            }
        };
        Self {
            bounds,
            children: node.children.map(NodeRef::encode),
            visibility: node.visibility,
            kind,
            child_count: node.child_count as u32,
        }
    }
}

impl TryFrom<&PackedNode> for Node<Binary> {
    type Error = SceneError;

    fn try_from(packed: &PackedNode) -> Result<Self, SceneError> {
        if packed.child_count > 2 {
            return Err(SceneError::Packed(format!(
                "node declares {} children",
                packed.child_count
            )));
        }
        let b = &packed.bounds;
        let bounds = match packed.kind {
            NODE_ALIGNED => {
                let mut slots = [[[0.0; 2]; 3]; 2];
                for (slot, axes) in slots.iter_mut().enumerate() {
                    for (axis, lanes) in axes.iter_mut().enumerate() {
                        for (child, plane) in lanes.iter_mut().enumerate() {
                            *plane = b[slot * 6 + axis * 2 + child];
                        }
                    }
                }
                NodeBounds::Aligned { slots }
            }
            NODE_UNALIGNED => {
                let mut spaces = [UnitSpace::IDENTITY; 2];
                for (child, space) in spaces.iter_mut().enumerate() {
                    for (row, values) in space.rows.iter_mut().enumerate() {
                        values.copy_from_slice(&b[child * 12 + row * 4..child * 12 + row * 4 + 4]);
                    }
                }
                NodeBounds::Unaligned { spaces }
            }
            other => return Err(SceneError::Packed(format!("unknown node kind {other}"))),
        };
        Ok(Node {
            bounds,
            children: packed.children.map(NodeRef::decode),
            visibility: packed.visibility,
            child_count: packed.child_count as u8,
        })
    }
}

impl From<&LeafNode> for PackedLeaf {
    fn from(leaf: &LeafNode) -> Self {
        Self {
            start: leaf.start,
            end: leaf.end,
            visibility: leaf.visibility.bits(),
            kind: leaf.kind as u32,
        }
    }
}

impl TryFrom<&PackedLeaf> for LeafNode {
    type Error = SceneError;

    fn try_from(packed: &PackedLeaf) -> Result<Self, SceneError> {
        let kind = PrimitiveKind::from_tag(packed.kind)
            .ok_or_else(|| SceneError::Packed(format!("unknown primitive kind {}", packed.kind)))?;
        Ok(LeafNode {
            start: packed.start,
            end: packed.end,
            visibility: Visibility::from_bits_retain(packed.visibility),
            kind,
        })
    }
}

impl Scene<Binary> {
    /// The hierarchy in packed form.
    pub fn to_packed(&self) -> PackedHierarchy {
        PackedHierarchy {
            root: self.root().encode(),
            nodes: self.nodes().iter().map(PackedNode::from).collect(),
            leaves: self.leaves().iter().map(PackedLeaf::from).collect(),
        }
    }

    /// Decode a packed hierarchy and validate it together with the
    /// primitive and object data it refers to.
    pub fn from_packed(
        packed: &PackedHierarchy,
        prims: PrimitiveArrays,
        geometry: Geometry,
        objects: Vec<ObjectRecord>,
        shaders: Vec<ShaderRecord>,
    ) -> Result<Self, SceneError> {
        let nodes = packed
            .nodes
            .iter()
            .map(Node::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let leaves = packed
            .leaves
            .iter()
            .map(LeafNode::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Scene::new(SceneParts {
            nodes,
            leaves,
            root: NodeRef::decode(packed.root),
            prims,
            geometry,
            objects,
            shaders,
        })
    }
}
