//! Read-only scene arrays and their validation.
//!
//! A [`Scene`] is built once from [`SceneParts`] produced by an external
//! hierarchy builder. Validation checks every reference the traversal loop
//! follows, so queries can index the arrays without further checks, and
//! computes what a kernel needs to know up front: the feature set, the
//! worst-case stack demand and the deepest instance nesting.

use bitflags::bitflags;
use rayweave_math::{DecomposedTransform, Transform};

use crate::error::{PrimitiveError, SceneError};
use crate::features::FeatureSet;
use crate::intersect::Geometry;
use crate::lanes::LaneWidth;
use crate::node::{LeafNode, Node, NodeRef, PrimitiveKind};
use crate::ray::Visibility;
use crate::stack::MAX_INSTANCE_DEPTH;

bitflags! {
    /// Per-object flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u32 {
        /// Rays must be carried into object space before visiting the
        /// object's hierarchy.
        const INSTANCED = 1 << 0;
        /// The object bounds a volume.
        const HAS_VOLUME = 1 << 1;
    }
}

bitflags! {
    /// Per-shader flags relevant to traversal.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ShaderFlags: u32 {
        /// Shadow rays pass through, attenuated by the shadow transmission.
        const TRANSPARENT_SHADOW = 1 << 0;
    }
}

/// Shader data consulted by shadow queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderRecord {
    /// Flags.
    pub flags: ShaderFlags,
    /// Fraction of light passing through a transparent-shadow surface.
    pub shadow_transmission: f32,
}

impl ShaderRecord {
    /// An opaque shader.
    pub const OPAQUE: Self = Self {
        flags: ShaderFlags::empty(),
        shadow_transmission: 0.0,
    };

    /// A shader that lets `transmission` of the light through shadow rays.
    pub fn transparent(transmission: f32) -> Self {
        Self {
            flags: ShaderFlags::TRANSPARENT_SHADOW,
            shadow_transmission: transmission,
        }
    }

    /// Whether shadow rays pass through.
    #[inline]
    pub fn is_transparent_shadow(&self) -> bool {
        self.flags.contains(ShaderFlags::TRANSPARENT_SHADOW)
    }
}

impl Default for ShaderRecord {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// An object: its placement, its own hierarchy and its flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    /// Object-to-world transform.
    pub transform: Transform,
    /// World-to-object transform.
    pub inverse: Transform,
    /// Motion keys spread evenly over the shutter. Empty for static objects.
    pub motion: Vec<DecomposedTransform>,
    /// Root of the object's own hierarchy. Objects whose primitives live in
    /// the top-level hierarchy have none.
    pub root: Option<NodeRef>,
    /// Visibility of the whole object.
    pub visibility: Visibility,
    /// Flags.
    pub flags: ObjectFlags,
}

impl ObjectRecord {
    /// An object whose primitives are stored directly in the top-level hierarchy.
    pub fn flattened() -> Self {
        Self {
            transform: Transform::identity(),
            inverse: Transform::identity(),
            motion: Vec::new(),
            root: None,
            visibility: Visibility::ALL,
            flags: ObjectFlags::empty(),
        }
    }

    /// An instanced object placed by `transform` with its own hierarchy at `root`.
    ///
    /// A singular transform is kept as is and rejected when the scene is validated.
    pub fn instanced(root: NodeRef, transform: Transform) -> Self {
        Self {
            transform,
            inverse: transform.inverse().unwrap_or(transform),
            motion: Vec::new(),
            root: Some(root),
            visibility: Visibility::ALL,
            flags: ObjectFlags::INSTANCED,
        }
    }

    /// Attach motion keys.
    pub fn with_motion(mut self, keys: Vec<DecomposedTransform>) -> Self {
        self.motion = keys;
        self
    }

    /// Set visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Add flags.
    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Whether rays must be transformed to enter this object.
    #[inline]
    pub fn is_instanced(&self) -> bool {
        self.flags.contains(ObjectFlags::INSTANCED)
    }

    /// Whether the object bounds a volume.
    #[inline]
    pub fn has_volume(&self) -> bool {
        self.flags.contains(ObjectFlags::HAS_VOLUME)
    }
}

/// Per-address primitive attributes. All arrays have the same length; the
/// address of a primitive is its position in leaf order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimitiveArrays {
    /// Index into the kind-specific buffer in [`Geometry`].
    pub index: Vec<u32>,
    /// Owning object.
    pub object: Vec<u32>,
    /// Ray visibility.
    pub visibility: Vec<Visibility>,
    /// Shader index.
    pub shader: Vec<u32>,
}

impl PrimitiveArrays {
    /// Number of addresses.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether there are no primitives.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Append one primitive.
    pub fn push(&mut self, index: u32, object: u32, visibility: Visibility, shader: u32) {
        self.index.push(index);
        self.object.push(object);
        self.visibility.push(visibility);
        self.shader.push(shader);
    }
}

/// Unvalidated scene arrays, as produced by a hierarchy builder.
#[derive(Debug, Clone)]
pub struct SceneParts<W: LaneWidth> {
    /// Internal nodes of every hierarchy in the scene.
    pub nodes: Vec<Node<W>>,
    /// Leaves of every hierarchy in the scene.
    pub leaves: Vec<LeafNode>,
    /// Root of the top-level hierarchy.
    pub root: NodeRef,
    /// Per-address primitive attributes.
    pub prims: PrimitiveArrays,
    /// Kind-specific primitive buffers.
    pub geometry: Geometry,
    /// Objects.
    pub objects: Vec<ObjectRecord>,
    /// Shaders. When empty, every primitive is opaque.
    pub shaders: Vec<ShaderRecord>,
}

/// Validated, immutable scene data shared by all queries.
#[derive(Debug, Clone)]
pub struct Scene<W: LaneWidth> {
    parts: SceneParts<W>,
    features: FeatureSet,
    stack_demand: usize,
    instance_depth: usize,
}

impl<W: LaneWidth> Scene<W> {
    /// Validate scene arrays.
    pub fn new(parts: SceneParts<W>) -> Result<Self, SceneError> {
        validate_arrays(&parts)?;
        let features = collect_features(&parts);
        let mut walker = DemandWalker::new(&parts);
        let (mut stack_demand, mut instance_depth) = walker.visit(parts.root)?;
        for object in &parts.objects {
            if let Some(root) = object.root {
                let (demand, depth) = walker.visit(root)?;
                stack_demand = stack_demand.max(demand);
                instance_depth = instance_depth.max(depth);
            }
        }
        if instance_depth > MAX_INSTANCE_DEPTH {
            return Err(SceneError::InstanceDepth {
                depth: instance_depth,
                max: MAX_INSTANCE_DEPTH,
            });
        }
        log::debug!(
            "scene validated: {} nodes ({}-wide), {} leaves, {} primitives, {} objects, \
             features {:?}, stack demand {}, instance depth {}",
            parts.nodes.len(),
            W::WIDTH,
            parts.leaves.len(),
            parts.prims.len(),
            parts.objects.len(),
            features,
            stack_demand,
            instance_depth
        );
        Ok(Self {
            parts,
            features,
            stack_demand,
            instance_depth,
        })
    }

    /// Internal nodes.
    #[inline]
    pub fn nodes(&self) -> &[Node<W>] {
        &self.parts.nodes
    }

    /// Leaves.
    #[inline]
    pub fn leaves(&self) -> &[LeafNode] {
        &self.parts.leaves
    }

    /// Root of the top-level hierarchy.
    #[inline]
    pub fn root(&self) -> NodeRef {
        self.parts.root
    }

    /// Per-address primitive attributes.
    #[inline]
    pub fn prims(&self) -> &PrimitiveArrays {
        &self.parts.prims
    }

    /// Primitive buffers.
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.parts.geometry
    }

    /// Objects.
    #[inline]
    pub fn objects(&self) -> &[ObjectRecord] {
        &self.parts.objects
    }

    /// Shader of the primitive at `address`. Missing shaders are opaque.
    #[inline]
    pub fn shader_of(&self, address: u32) -> ShaderRecord {
        self.parts
            .prims
            .shader
            .get(address as usize)
            .and_then(|&s| self.parts.shaders.get(s as usize))
            .copied()
            .unwrap_or_default()
    }

    /// Features the scene uses.
    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// Worst-case number of stack entries any query needs.
    pub fn stack_demand(&self) -> usize {
        self.stack_demand
    }

    /// Deepest instance nesting.
    pub fn instance_depth(&self) -> usize {
        self.instance_depth
    }

    /// Give the arrays back.
    pub fn into_parts(self) -> SceneParts<W> {
        self.parts
    }
}

fn check_ref<W: LaneWidth>(parts: &SceneParts<W>, r: NodeRef) -> Result<(), SceneError> {
    match r {
        NodeRef::Internal(index) if index as usize >= parts.nodes.len() => {
            Err(SceneError::DanglingNode {
                index,
                count: parts.nodes.len(),
            })
        }
        NodeRef::Leaf(index) if index as usize >= parts.leaves.len() => {
            Err(SceneError::DanglingLeaf {
                index,
                count: parts.leaves.len(),
            })
        }
        _ => Ok(()),
    }
}

fn validate_arrays<W: LaneWidth>(parts: &SceneParts<W>) -> Result<(), SceneError> {
    let prims = &parts.prims;
    let n = prims.index.len();
    if prims.object.len() != n || prims.visibility.len() != n || prims.shader.len() != n {
        return Err(SceneError::AttributeLength(format!(
            "index {}, object {}, visibility {}, shader {}",
            n,
            prims.object.len(),
            prims.visibility.len(),
            prims.shader.len()
        )));
    }

    check_ref(parts, parts.root)?;
    for (i, node) in parts.nodes.iter().enumerate() {
        if node.child_count as usize > W::WIDTH {
            return Err(SceneError::ChildCount {
                node: i as u32,
                count: node.child_count,
                width: W::WIDTH,
            });
        }
        for &child in node.child_refs() {
            check_ref(parts, child)?;
        }
    }

    let object_count = parts.objects.len();
    for (i, leaf) in parts.leaves.iter().enumerate() {
        if leaf.kind == PrimitiveKind::Instance {
            if leaf.end != leaf.start.wrapping_add(1) {
                return Err(SceneError::InstanceRange {
                    leaf: i as u32,
                    start: leaf.start,
                    end: leaf.end,
                });
            }
            let object = parts
                .objects
                .get(leaf.start as usize)
                .ok_or(SceneError::UnknownObject {
                    object: leaf.start,
                    count: object_count,
                })?;
            if object.root.is_none() {
                return Err(SceneError::MissingRoot(leaf.start));
            }
            continue;
        }
        if leaf.start > leaf.end || leaf.end as usize > n {
            return Err(SceneError::PrimitiveRange {
                leaf: i as u32,
                start: leaf.start,
                end: leaf.end,
                count: n,
            });
        }
        for address in leaf.start..leaf.end {
            let a = address as usize;
            parts
                .geometry
                .check(leaf.kind, prims.index[a])
                .map_err(|source| SceneError::Primitive { address, source })?;
            if prims.object[a] as usize >= object_count {
                return Err(SceneError::UnknownObject {
                    object: prims.object[a],
                    count: object_count,
                });
            }
            if !parts.shaders.is_empty() && prims.shader[a] as usize >= parts.shaders.len() {
                return Err(SceneError::Primitive {
                    address,
                    source: PrimitiveError::UnknownShader {
                        shader: prims.shader[a],
                        count: parts.shaders.len(),
                    },
                });
            }
        }
    }

    for (i, object) in parts.objects.iter().enumerate() {
        if let Some(root) = object.root {
            check_ref(parts, root)?;
        }
        let keys_finite = object.motion.iter().all(|k| k.compose().is_finite());
        let invertible = object.transform.is_finite()
            && object.inverse.is_finite()
            && object.transform.inverse().is_some();
        if object.is_instanced() && !(invertible && keys_finite) {
            return Err(SceneError::DegenerateTransform(i as u32));
        }
    }
    Ok(())
}

fn collect_features<W: LaneWidth>(parts: &SceneParts<W>) -> FeatureSet {
    let mut features = FeatureSet::empty();
    for leaf in &parts.leaves {
        features |= match leaf.kind {
            PrimitiveKind::Triangle => FeatureSet::empty(),
            PrimitiveKind::MotionTriangle => FeatureSet::MOTION,
            PrimitiveKind::Curve => FeatureSet::HAIR,
            PrimitiveKind::Point => FeatureSet::POINTCLOUD,
            PrimitiveKind::Instance => FeatureSet::INSTANCING,
        };
    }
    if parts.objects.iter().any(|o| o.is_instanced() && !o.motion.is_empty()) {
        features |= FeatureSet::MOTION;
    }
    features
}

#[derive(Clone, Copy)]
enum Mark {
    Unvisited,
    Visiting,
    Done(usize, usize),
}

/// Computes `(stack demand, instance depth)` per subtree.
///
/// The traversal loop continues into the nearest hit child and pushes the
/// others, so a node with `k` children needs `k - 1` entries on top of the
/// worst child. Entering an instance pushes one return marker.
struct DemandWalker<'a, W: LaneWidth> {
    parts: &'a SceneParts<W>,
    nodes: Vec<Mark>,
    objects: Vec<Mark>,
}

impl<'a, W: LaneWidth> DemandWalker<'a, W> {
    fn new(parts: &'a SceneParts<W>) -> Self {
        Self {
            parts,
            nodes: vec![Mark::Unvisited; parts.nodes.len()],
            objects: vec![Mark::Unvisited; parts.objects.len()],
        }
    }

    fn visit(&mut self, r: NodeRef) -> Result<(usize, usize), SceneError> {
        match r {
            NodeRef::Internal(index) => {
                let i = index as usize;
                match self.nodes[i] {
                    Mark::Done(demand, depth) => return Ok((demand, depth)),
                    Mark::Visiting => return Err(SceneError::NodeCycle(index)),
                    Mark::Unvisited => {}
                }
                self.nodes[i] = Mark::Visiting;
                let node = &self.parts.nodes[i];
                let mut child_demand = 0;
                let mut depth = 0;
                for &child in node.child_refs() {
                    let (d, n) = self.visit(child)?;
                    child_demand = child_demand.max(d);
                    depth = depth.max(n);
                }
                let demand = node.child_refs().len().saturating_sub(1) + child_demand;
                self.nodes[i] = Mark::Done(demand, depth);
                Ok((demand, depth))
            }
            NodeRef::Leaf(index) => {
                let leaf = &self.parts.leaves[index as usize];
                if leaf.kind != PrimitiveKind::Instance {
                    return Ok((0, 0));
                }
                let object = leaf.start;
                let o = object as usize;
                match self.objects[o] {
                    Mark::Done(demand, depth) => return Ok((demand, depth)),
                    Mark::Visiting => return Err(SceneError::InstanceCycle(object)),
                    Mark::Unvisited => {}
                }
                self.objects[o] = Mark::Visiting;
                let root = self.parts.objects[o]
                    .root
                    .ok_or(SceneError::MissingRoot(object))?;
                let (demand, depth) = self.visit(root)?;
                let result = (demand + 1, depth + 1);
                self.objects[o] = Mark::Done(result.0, result.1);
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersect::Geometry;
    use crate::lanes::{Binary, Quad};
    use rayweave_math::{Aabb3, Point3};

    fn unit_box() -> Aabb3 {
        Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))
    }

    fn one_triangle() -> (Geometry, PrimitiveArrays) {
        let geometry = Geometry {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            triangles: vec![[0, 1, 2]],
            ..Default::default()
        };
        let mut prims = PrimitiveArrays::default();
        prims.push(0, 0, Visibility::ALL, 0);
        (geometry, prims)
    }

    /// A mesh object (node 0 over leaf 0) instanced by a top-level node.
    fn instanced_parts() -> SceneParts<Binary> {
        let (geometry, prims) = one_triangle();
        SceneParts {
            nodes: vec![
                Node::aligned(&[(NodeRef::Leaf(0), unit_box(), Visibility::ALL)]),
                Node::aligned(&[
                    (NodeRef::Leaf(1), unit_box(), Visibility::ALL),
                    (NodeRef::Leaf(2), unit_box(), Visibility::ALL),
                ]),
            ],
            leaves: vec![
                LeafNode::primitives(PrimitiveKind::Triangle, 0, 1, Visibility::ALL),
                LeafNode::instance(0, Visibility::ALL),
                LeafNode::instance(0, Visibility::ALL),
            ],
            root: NodeRef::Internal(1),
            prims,
            geometry,
            objects: vec![ObjectRecord::instanced(
                NodeRef::Internal(0),
                Transform::translation(2.0, 0.0, 0.0),
            )],
            shaders: Vec::new(),
        }
    }

    #[test]
    fn test_valid_instanced_scene() {
        let scene = Scene::new(instanced_parts()).unwrap();
        assert_eq!(scene.features(), FeatureSet::INSTANCING);
        // One sibling pushed at the top, one return marker, nothing below.
        assert_eq!(scene.stack_demand(), 2);
        assert_eq!(scene.instance_depth(), 1);
        assert_eq!(scene.shader_of(0), ShaderRecord::OPAQUE);
    }

    #[test]
    fn test_dangling_references() {
        let mut parts = instanced_parts();
        parts.root = NodeRef::Internal(9);
        assert!(matches!(
            Scene::new(parts),
            Err(SceneError::DanglingNode { index: 9, .. })
        ));

        let mut parts = instanced_parts();
        parts.nodes[0] = Node::aligned(&[(NodeRef::Leaf(5), unit_box(), Visibility::ALL)]);
        assert!(matches!(
            Scene::new(parts),
            Err(SceneError::DanglingLeaf { index: 5, .. })
        ));
    }

    #[test]
    fn test_bad_ranges() {
        let mut parts = instanced_parts();
        parts.leaves[0].end = 4;
        assert!(matches!(Scene::new(parts), Err(SceneError::PrimitiveRange { .. })));

        let mut parts = instanced_parts();
        parts.leaves[1].end = 3;
        assert!(matches!(Scene::new(parts), Err(SceneError::InstanceRange { .. })));

        let mut parts = instanced_parts();
        parts.prims.index[0] = 3;
        assert!(matches!(
            Scene::new(parts),
            Err(SceneError::Primitive {
                address: 0,
                source: PrimitiveError::IndexOutOfRange { index: 3, .. }
            })
        ));

        let mut parts = instanced_parts();
        parts.prims.shader.push(0);
        assert!(matches!(Scene::new(parts), Err(SceneError::AttributeLength(_))));
    }

    #[test]
    fn test_instance_cycle() {
        let mut parts = instanced_parts();
        // The object's own hierarchy instances itself.
        parts.leaves.push(LeafNode::instance(0, Visibility::ALL));
        parts
            .nodes
            .push(Node::aligned(&[(NodeRef::Leaf(3), unit_box(), Visibility::ALL)]));
        parts.objects[0].root = Some(NodeRef::Internal(2));
        assert_eq!(Scene::new(parts).unwrap_err(), SceneError::InstanceCycle(0));
    }

    #[test]
    fn test_node_cycle() {
        let mut parts = instanced_parts();
        parts.nodes[0] = Node::aligned(&[(NodeRef::Internal(0), unit_box(), Visibility::ALL)]);
        assert_eq!(Scene::new(parts).unwrap_err(), SceneError::NodeCycle(0));
    }

    #[test]
    fn test_degenerate_transform() {
        let mut parts = instanced_parts();
        parts.objects[0] = ObjectRecord::instanced(NodeRef::Internal(0), Transform::scale(0.0, 1.0, 1.0));
        assert_eq!(Scene::new(parts).unwrap_err(), SceneError::DegenerateTransform(0));
    }

    #[test]
    fn test_instance_depth_limit() {
        // A chain of objects, each instancing the next.
        let (geometry, prims) = one_triangle();
        let levels = MAX_INSTANCE_DEPTH + 1;
        let mut nodes: Vec<Node<Quad>> = Vec::new();
        let mut leaves = vec![LeafNode::primitives(PrimitiveKind::Triangle, 0, 1, Visibility::ALL)];
        let mut objects = Vec::new();
        nodes.push(Node::aligned(&[(NodeRef::Leaf(0), unit_box(), Visibility::ALL)]));
        objects.push(ObjectRecord::instanced(NodeRef::Internal(0), Transform::identity()));
        for level in 1..levels {
            leaves.push(LeafNode::instance(level as u32 - 1, Visibility::ALL));
            nodes.push(Node::aligned(&[(
                NodeRef::Leaf(level as u32),
                unit_box(),
                Visibility::ALL,
            )]));
            objects.push(ObjectRecord::instanced(
                NodeRef::Internal(level as u32),
                Transform::identity(),
            ));
        }
        leaves.push(LeafNode::instance(levels as u32 - 1, Visibility::ALL));
        nodes.push(Node::aligned(&[(
            NodeRef::Leaf(levels as u32),
            unit_box(),
            Visibility::ALL,
        )]));
        let parts = SceneParts {
            root: NodeRef::Internal(levels as u32),
            nodes,
            leaves,
            prims,
            geometry,
            objects,
            shaders: Vec::new(),
        };
        assert!(matches!(
            Scene::new(parts),
            Err(SceneError::InstanceDepth { depth, .. }) if depth == levels
        ));
    }

    #[test]
    fn test_shader_lookup() {
        let mut parts = instanced_parts();
        parts.shaders = vec![ShaderRecord::transparent(0.5)];
        let scene = Scene::new(parts).unwrap();
        assert!(scene.shader_of(0).is_transparent_shadow());
        assert_eq!(scene.shader_of(0).shadow_transmission, 0.5);

        let mut parts = instanced_parts();
        parts.shaders = vec![ShaderRecord::OPAQUE];
        parts.prims.shader[0] = 2;
        assert!(matches!(
            Scene::new(parts),
            Err(SceneError::Primitive {
                source: PrimitiveError::UnknownShader { shader: 2, count: 1 },
                ..
            })
        ));
    }
}
