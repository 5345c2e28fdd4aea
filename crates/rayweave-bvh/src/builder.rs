//! Small SAH scene builder for tests and benchmarks.
//!
//! Production hierarchies come from an external builder; this one exists so
//! that traversal can be exercised on realistic trees. It builds a binary
//! tree with bucketed SAH, collapses it to the target width and optionally
//! bounds curve leaves with oriented unit-box spaces.

use std::marker::PhantomData;

use rayweave_math::{Aabb3, Point3, Transform, Vec3};

use crate::error::SceneError;
use crate::intersect::{CurveKey, Geometry, PointPrim};
use crate::lanes::LaneWidth;
use crate::node::{LeafNode, Node, NodeRef, PrimitiveKind, UnitSpace};
use crate::ray::Visibility;
use crate::scene::{
    ObjectFlags, ObjectRecord, PrimitiveArrays, Scene, SceneParts, ShaderRecord,
};

/// A hierarchy built separately and placed by instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prototype(usize);

/// Where added primitives go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The top-level hierarchy, owned by a flattened object.
    Object(u32),
    /// A prototype's own hierarchy.
    Prototype(Prototype),
}

#[derive(Debug, Clone, Copy)]
struct PendingPrim {
    kind: PrimitiveKind,
    index: u32,
    target: Target,
    visibility: Visibility,
    shader: u32,
    bounds: Aabb3,
}

#[derive(Debug, Clone, Copy)]
struct PendingInstance {
    object: u32,
    parent: Option<Prototype>,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Prim(usize),
    Instance(u32),
}

#[derive(Debug, Clone, Copy)]
struct Item {
    source: Source,
    kind: PrimitiveKind,
    visibility: Visibility,
    bounds: Aabb3,
    centroid: Point3,
}

enum BinNode {
    Leaf {
        bounds: Aabb3,
        visibility: Visibility,
        kind: PrimitiveKind,
        items: Vec<Item>,
    },
    Inner {
        bounds: Aabb3,
        visibility: Visibility,
        left: Box<BinNode>,
        right: Box<BinNode>,
    },
}

impl BinNode {
    fn bounds(&self) -> Aabb3 {
        match self {
            BinNode::Leaf { bounds, .. } | BinNode::Inner { bounds, .. } => *bounds,
        }
    }

    fn visibility(&self) -> Visibility {
        match self {
            BinNode::Leaf { visibility, .. } | BinNode::Inner { visibility, .. } => *visibility,
        }
    }
}

/// Collects primitives, objects and instances, then builds a [`Scene`].
#[derive(Debug, Clone)]
pub struct SceneBuilder<W: LaneWidth> {
    geometry: Geometry,
    prims: Vec<PendingPrim>,
    instances: Vec<PendingInstance>,
    objects: Vec<ObjectRecord>,
    instance_of: Vec<Option<Prototype>>,
    prototypes: usize,
    shaders: Vec<ShaderRecord>,
    visibility: Visibility,
    leaf_size: usize,
    unaligned_curves: bool,
    _width: PhantomData<W>,
}

impl<W: LaneWidth> Default for SceneBuilder<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: LaneWidth> SceneBuilder<W> {
    /// Empty builder with leaves of up to four primitives.
    pub fn new() -> Self {
        Self {
            geometry: Geometry::default(),
            prims: Vec::new(),
            instances: Vec::new(),
            objects: Vec::new(),
            instance_of: Vec::new(),
            prototypes: 0,
            shaders: Vec::new(),
            visibility: Visibility::ALL,
            leaf_size: 4,
            unaligned_curves: false,
            _width: PhantomData,
        }
    }

    /// Maximum primitives per leaf.
    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size.max(1);
        self
    }

    /// Bound curve leaves with oriented unit-box spaces.
    pub fn with_unaligned_curves(mut self, enabled: bool) -> Self {
        self.unaligned_curves = enabled;
        self
    }

    /// Visibility given to primitives added from now on.
    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    /// Register a shader and return its index.
    pub fn add_shader(&mut self, shader: ShaderRecord) -> u32 {
        self.shaders.push(shader);
        self.shaders.len() as u32 - 1
    }

    /// Add an object whose primitives live in the top-level hierarchy.
    pub fn add_object(&mut self, flags: ObjectFlags) -> u32 {
        self.objects.push(ObjectRecord::flattened().with_flags(flags));
        self.instance_of.push(None);
        self.objects.len() as u32 - 1
    }

    /// Start a separately built hierarchy.
    pub fn add_prototype(&mut self) -> Prototype {
        self.prototypes += 1;
        Prototype(self.prototypes - 1)
    }

    /// Place `prototype` with `transform`, either in the top level or inside
    /// another prototype. Returns the new object.
    pub fn add_instance(
        &mut self,
        parent: Option<Prototype>,
        prototype: Prototype,
        transform: Transform,
    ) -> u32 {
        let object = self.objects.len() as u32;
        // The root is filled in when the prototype is built.
        self.objects
            .push(ObjectRecord::instanced(NodeRef::Internal(0), transform));
        self.instance_of.push(Some(prototype));
        self.instances.push(PendingInstance { object, parent });
        object
    }

    /// Adjust an object after adding it, e.g. to attach motion or flags.
    pub fn object_mut(&mut self, object: u32) -> Option<&mut ObjectRecord> {
        self.objects.get_mut(object as usize)
    }

    fn push_prim(&mut self, kind: PrimitiveKind, index: u32, target: Target, shader: u32, bounds: Aabb3) -> usize {
        self.prims.push(PendingPrim {
            kind,
            index,
            target,
            visibility: self.visibility,
            shader,
            bounds,
        });
        self.prims.len() - 1
    }

    /// Add a triangle. Returns its index in the triangle buffer.
    pub fn add_triangle(&mut self, target: Target, verts: [Point3; 3], shader: u32) -> u32 {
        let base = self.geometry.vertices.len() as u32;
        self.geometry.vertices.extend(verts);
        let index = self.geometry.triangles.len() as u32;
        self.geometry.triangles.push([base, base + 1, base + 2]);
        let mut bounds = Aabb3::empty();
        verts.iter().for_each(|p| bounds.include_point(p));
        self.push_prim(PrimitiveKind::Triangle, index, target, shader, bounds);
        index
    }

    /// Add an axis-aligned quad as two triangles.
    pub fn add_quad(&mut self, target: Target, corners: [Point3; 4], shader: u32) {
        self.add_triangle(target, [corners[0], corners[1], corners[2]], shader);
        self.add_triangle(target, [corners[0], corners[2], corners[3]], shader);
    }

    /// Add a triangle with one vertex triple per motion step.
    ///
    /// # Panics
    ///
    /// Panics if the step count differs from earlier motion triangles.
    pub fn add_motion_triangle(&mut self, target: Target, keys: &[[Point3; 3]], shader: u32) -> u32 {
        if self.geometry.motion_vertices.is_empty() {
            self.geometry.motion_vertices = vec![Vec::new(); keys.len()];
        }
        assert_eq!(
            self.geometry.motion_vertices.len(),
            keys.len(),
            "all motion triangles need the same number of steps"
        );
        let base = self.geometry.motion_vertices[0].len() as u32;
        let mut bounds = Aabb3::empty();
        for (step, verts) in self.geometry.motion_vertices.iter_mut().zip(keys) {
            step.extend(verts);
            verts.iter().for_each(|p| bounds.include_point(p));
        }
        let index = self.geometry.motion_triangles.len() as u32;
        self.geometry.motion_triangles.push([base, base + 1, base + 2]);
        self.push_prim(PrimitiveKind::MotionTriangle, index, target, shader, bounds);
        index
    }

    /// Add a curve through `keys`, one primitive per segment. Returns the
    /// index of the first segment.
    pub fn add_curve(&mut self, target: Target, keys: &[CurveKey], shader: u32) -> u32 {
        let base = self.geometry.curve_keys.len() as u32;
        self.geometry.curve_keys.extend_from_slice(keys);
        let first = self.geometry.curve_segments.len() as u32;
        for (i, pair) in keys.windows(2).enumerate() {
            let index = self.geometry.curve_segments.len() as u32;
            let k = base + i as u32;
            self.geometry.curve_segments.push([k, k + 1]);
            let bounds = crate::intersect::curve::bounds(&pair[0], &pair[1]);
            self.push_prim(PrimitiveKind::Curve, index, target, shader, bounds);
        }
        first
    }

    /// Add a point. Returns its index in the point buffer.
    pub fn add_point(&mut self, target: Target, center: Point3, radius: f32, shader: u32) -> u32 {
        let point = PointPrim::new(center, radius);
        let index = self.geometry.points.len() as u32;
        self.geometry.points.push(point);
        self.push_prim(PrimitiveKind::Point, index, target, shader, point.bounds());
        index
    }

    /// Build the arrays without validating them.
    pub fn build_parts(self) -> SceneParts<W> {
        Emitter::new(self).run()
    }

    /// Build and validate the scene.
    pub fn build(self) -> Result<Scene<W>, SceneError> {
        Scene::new(self.build_parts())
    }
}

struct Emitter<W: LaneWidth> {
    input: SceneBuilder<W>,
    proto_bounds: Vec<Option<Aabb3>>,
    nodes: Vec<Node<W>>,
    leaves: Vec<LeafNode>,
    prims: PrimitiveArrays,
    proto_owner: Vec<u32>,
}

impl<W: LaneWidth> Emitter<W> {
    fn new(input: SceneBuilder<W>) -> Self {
        let mut proto_owner = vec![0; input.prototypes];
        for (object, proto) in input.instance_of.iter().enumerate().rev() {
            if let Some(p) = proto {
                proto_owner[p.0] = object as u32;
            }
        }
        Self {
            proto_bounds: vec![None; input.prototypes],
            input,
            nodes: Vec::new(),
            leaves: Vec::new(),
            prims: PrimitiveArrays::default(),
            proto_owner,
        }
    }

    fn run(mut self) -> SceneParts<W> {
        let mut proto_roots = Vec::with_capacity(self.input.prototypes);
        for p in 0..self.input.prototypes {
            let items = self.items(Some(Prototype(p)));
            proto_roots.push(self.emit_group(items));
        }
        let items = self.items(None);
        let root = self.emit_group(items);

        let mut objects = self.input.objects;
        for (object, proto) in objects.iter_mut().zip(&self.input.instance_of) {
            if let Some(p) = proto {
                object.root = Some(proto_roots[p.0]);
            }
        }
        SceneParts {
            nodes: self.nodes,
            leaves: self.leaves,
            root,
            prims: self.prims,
            geometry: self.input.geometry,
            objects,
            shaders: self.input.shaders,
        }
    }

    fn prototype_bounds(&mut self, proto: Prototype, visiting: &mut Vec<bool>) -> Aabb3 {
        if let Some(bounds) = self.proto_bounds[proto.0] {
            return bounds;
        }
        if visiting[proto.0] {
            // Cyclic instancing; validation reports it.
            return Aabb3::empty();
        }
        visiting[proto.0] = true;
        let mut bounds = Aabb3::empty();
        for prim in &self.input.prims {
            if prim.target == Target::Prototype(proto) {
                bounds.include_aabb(&prim.bounds);
            }
        }
        let nested: Vec<u32> = self
            .input
            .instances
            .iter()
            .filter(|i| i.parent == Some(proto))
            .map(|i| i.object)
            .collect();
        for object in nested {
            let b = self.instance_bounds(object, visiting);
            bounds.include_aabb(&b);
        }
        visiting[proto.0] = false;
        self.proto_bounds[proto.0] = Some(bounds);
        bounds
    }

    fn instance_bounds(&mut self, object: u32, visiting: &mut Vec<bool>) -> Aabb3 {
        let Some(proto) = self.input.instance_of[object as usize] else {
            return Aabb3::empty();
        };
        let local = self.prototype_bounds(proto, visiting);
        if local.is_empty() {
            return local;
        }
        let record = &self.input.objects[object as usize];
        let mut bounds = local.transformed(&record.transform);
        for key in &record.motion {
            bounds.include_aabb(&local.transformed(&key.compose()));
        }
        bounds
    }

    fn items(&mut self, group: Option<Prototype>) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .input
            .prims
            .iter()
            .enumerate()
            .filter(|(_, p)| match (group, p.target) {
                (None, Target::Object(_)) => true,
                (Some(g), Target::Prototype(t)) => g == t,
                _ => false,
            })
            .map(|(i, p)| Item {
                source: Source::Prim(i),
                kind: p.kind,
                visibility: p.visibility,
                bounds: p.bounds,
                centroid: p.bounds.centroid(),
            })
            .collect();
        let placed: Vec<u32> = self
            .input
            .instances
            .iter()
            .filter(|i| i.parent == group)
            .map(|i| i.object)
            .collect();
        for object in placed {
            let mut visiting = vec![false; self.input.prototypes];
            let bounds = self.instance_bounds(object, &mut visiting);
            items.push(Item {
                source: Source::Instance(object),
                kind: PrimitiveKind::Instance,
                visibility: self.input.objects[object as usize].visibility,
                bounds,
                centroid: bounds.centroid(),
            });
        }
        items
    }

    fn emit_group(&mut self, mut items: Vec<Item>) -> NodeRef {
        if items.is_empty() {
            self.nodes.push(Node::aligned(&[]));
            return NodeRef::Internal(self.nodes.len() as u32 - 1);
        }
        let tree = build_node(&mut items, self.input.leaf_size);
        self.emit(tree)
    }

    fn emit(&mut self, node: BinNode) -> NodeRef {
        let (left, right) = match node {
            BinNode::Leaf {
                visibility,
                kind,
                items,
                ..
            } => return self.emit_leaf(kind, visibility, &items),
            BinNode::Inner { left, right, .. } => (left, right),
        };

        let mut children = vec![*left, *right];
        while children.len() < W::WIDTH {
            let widest = children
                .iter()
                .enumerate()
                .filter(|(_, c)| matches!(c, BinNode::Inner { .. }))
                .max_by(|a, b| a.1.bounds().surface_area().total_cmp(&b.1.bounds().surface_area()))
                .map(|(i, _)| i);
            let Some(i) = widest else { break };
            if let BinNode::Inner { left, right, .. } = children.swap_remove(i) {
                children.push(*left);
                children.push(*right);
            }
        }

        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            let bounds = child.bounds();
            let visibility = child.visibility();
            let space = match &child {
                BinNode::Leaf {
                    kind: PrimitiveKind::Curve,
                    items,
                    ..
                } if self.input.unaligned_curves => self.curve_space(items),
                _ => None,
            };
            let r = self.emit(child);
            entries.push((r, bounds, visibility, space));
        }

        let node = if entries.iter().any(|e| e.3.is_some()) {
            let spaces: Vec<_> = entries
                .iter()
                .map(|(r, b, v, s)| (*r, s.unwrap_or_else(|| UnitSpace::from_aabb(b)), *v))
                .collect();
            Node::unaligned(&spaces)
        } else {
            let boxes: Vec<_> = entries.iter().map(|(r, b, v, _)| (*r, *b, *v)).collect();
            Node::aligned(&boxes)
        };
        self.nodes.push(node);
        NodeRef::Internal(self.nodes.len() as u32 - 1)
    }

    fn emit_leaf(&mut self, kind: PrimitiveKind, visibility: Visibility, items: &[Item]) -> NodeRef {
        let leaf = match (kind, items) {
            (
                PrimitiveKind::Instance,
                [Item {
                    source: Source::Instance(object),
                    ..
                }],
            ) => LeafNode::instance(*object, visibility),
            _ => {
                let start = self.prims.len() as u32;
                for item in items {
                    if let Source::Prim(i) = item.source {
                        let p = self.input.prims[i];
                        let owner = match p.target {
                            Target::Object(o) => o,
                            Target::Prototype(proto) => self.proto_owner[proto.0],
                        };
                        self.prims.push(p.index, owner, p.visibility, p.shader);
                    }
                }
                LeafNode::primitives(kind, start, self.prims.len() as u32, visibility)
            }
        };
        self.leaves.push(leaf);
        NodeRef::Leaf(self.leaves.len() as u32 - 1)
    }

    /// Oriented space around the curve segments of a leaf, aligned with
    /// their overall direction.
    fn curve_space(&self, items: &[Item]) -> Option<UnitSpace> {
        let g = &self.input.geometry;
        let segments: Vec<[CurveKey; 2]> = items
            .iter()
            .filter_map(|item| match item.source {
                Source::Prim(i) => {
                    let [a, b] = *g.curve_segments.get(self.input.prims[i].index as usize)?;
                    Some([*g.curve_keys.get(a as usize)?, *g.curve_keys.get(b as usize)?])
                }
                Source::Instance(_) => None,
            })
            .collect();
        let dir: Vec3 = segments
            .iter()
            .map(|[a, b]| b.position - a.position)
            .sum();
        let x = dir.try_normalize(1e-6)?;
        let helper = if x.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
        let y = x.cross(&helper).normalize();
        let z = x.cross(&y);
        let frame = [x, y, z];

        let mut local = Aabb3::empty();
        for key in segments.iter().flatten() {
            let p = key.position.coords;
            let q = Point3::new(x.dot(&p), y.dot(&p), z.dot(&p));
            let mut b = Aabb3::new(q, q);
            b.expand(key.radius);
            local.include_aabb(&b);
        }
        Some(UnitSpace::from_frame(&frame, &local))
    }
}

/// Build a binary node over `items` using SAH.
fn build_node(items: &mut [Item], leaf_size: usize) -> BinNode {
    let mut bounds = Aabb3::empty();
    let mut visibility = Visibility::empty();
    for item in items.iter() {
        bounds.include_aabb(&item.bounds);
        visibility |= item.visibility;
    }

    let kind = items[0].kind;
    let uniform = items.iter().all(|i| i.kind == kind);
    let fits = if kind == PrimitiveKind::Instance {
        items.len() == 1
    } else {
        items.len() <= leaf_size
    };
    if uniform && fits {
        return BinNode::Leaf {
            bounds,
            visibility,
            kind,
            items: items.to_vec(),
        };
    }

    let mut mid = match find_best_split(items, &bounds) {
        Some((axis, pos)) => partition(items, axis, pos),
        None => 0,
    };
    if mid == 0 || mid == items.len() {
        if uniform {
            mid = items.len() / 2;
        } else {
            // Leaves hold one primitive kind; split at the first kind boundary.
            items.sort_by_key(|i| i.kind as u32);
            mid = items
                .iter()
                .position(|i| i.kind != items[0].kind)
                .unwrap_or(items.len() / 2);
        }
    }

    let (left, right) = items.split_at_mut(mid);
    BinNode::Inner {
        bounds,
        visibility,
        left: Box::new(build_node(left, leaf_size)),
        right: Box::new(build_node(right, leaf_size)),
    }
}

/// Find the best split axis and position with bucketed SAH.
fn find_best_split(items: &[Item], bounds: &Aabb3) -> Option<(usize, f32)> {
    const NUM_BUCKETS: usize = 12;

    let mut centroid_bounds = Aabb3::empty();
    for item in items {
        centroid_bounds.include_point(&item.centroid);
    }
    let extent = centroid_bounds.extent();
    let total_area = bounds.surface_area().max(f32::MIN_POSITIVE);

    let mut best: Option<(f32, usize, f32)> = None;
    for axis in 0..3 {
        let axis_extent = extent[axis];
        if !(axis_extent > 1e-7) {
            continue;
        }
        let axis_min = centroid_bounds.min[axis];

        let mut bucket_counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];
        for item in items {
            let b = ((item.centroid[axis] - axis_min) / axis_extent * NUM_BUCKETS as f32) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            bucket_counts[b] += 1;
            bucket_bounds[b].include_aabb(&item.bounds);
        }

        for split in 1..NUM_BUCKETS {
            let (mut left_count, mut right_count) = (0, 0);
            let (mut left_bounds, mut right_bounds) = (Aabb3::empty(), Aabb3::empty());
            for i in 0..split {
                left_count += bucket_counts[i];
                left_bounds.include_aabb(&bucket_bounds[i]);
            }
            for i in split..NUM_BUCKETS {
                right_count += bucket_counts[i];
                right_bounds.include_aabb(&bucket_bounds[i]);
            }
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let cost = 0.125
                + left_bounds.surface_area() / total_area * left_count as f32
                + right_bounds.surface_area() / total_area * right_count as f32;
            if best.map_or(true, |(c, _, _)| cost < c) {
                let pos = axis_min + (split as f32 / NUM_BUCKETS as f32) * axis_extent;
                best = Some((cost, axis, pos));
            }
        }
    }
    best.map(|(_, axis, pos)| (axis, pos))
}

/// Partition items by centroid along an axis.
fn partition(items: &mut [Item], axis: usize, pos: f32) -> usize {
    let mut left = 0;
    let mut right = items.len();
    while left < right {
        if items[left].centroid[axis] < pos {
            left += 1;
        } else {
            right -= 1;
            items.swap(left, right);
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::{Binary, Octo, Quad};

    fn grid<W: LaneWidth>(builder: &mut SceneBuilder<W>, n: usize) {
        let object = builder.add_object(ObjectFlags::empty());
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (i as f32, j as f32);
                builder.add_triangle(
                    Target::Object(object),
                    [
                        Point3::new(x, y, 0.0),
                        Point3::new(x + 0.9, y, 0.0),
                        Point3::new(x, y + 0.9, 0.0),
                    ],
                    0,
                );
            }
        }
    }

    fn check_widths<W: LaneWidth>() {
        let mut builder = SceneBuilder::<W>::new();
        grid(&mut builder, 8);
        let scene = builder.build().unwrap();
        assert_eq!(scene.prims().len(), 64);
        for node in scene.nodes() {
            assert!(node.child_refs().len() <= W::WIDTH);
            assert!(node.child_refs().len() >= 2);
        }
        for leaf in scene.leaves() {
            assert!(leaf.end - leaf.start <= 4);
        }
    }

    #[test]
    fn test_builds_every_width() {
        check_widths::<Binary>();
        check_widths::<Quad>();
        check_widths::<Octo>();
    }

    #[test]
    fn test_wide_nodes_are_filled() {
        let mut builder = SceneBuilder::<Octo>::new();
        grid(&mut builder, 8);
        let scene = builder.build().unwrap();
        let Some(NodeRef::Internal(root)) = Some(scene.root()) else {
            panic!("expected internal root");
        };
        assert_eq!(scene.nodes()[root as usize].child_refs().len(), 8);
    }

    #[test]
    fn test_leaves_hold_one_kind() {
        let mut builder = SceneBuilder::<Quad>::new().with_leaf_size(8);
        let object = builder.add_object(ObjectFlags::empty());
        let target = Target::Object(object);
        builder.add_triangle(
            target,
            [Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            0,
        );
        builder.add_point(target, Point3::new(0.1, 0.1, 0.0), 0.5, 0);
        builder.add_curve(
            target,
            &[
                CurveKey::new(Point3::origin(), 0.1),
                CurveKey::new(Point3::new(0.0, 0.0, 1.0), 0.1),
            ],
            0,
        );
        let scene = builder.build().unwrap();
        assert_eq!(scene.leaves().len(), 3);
        let mut kinds: Vec<u32> = scene.leaves().iter().map(|l| l.kind as u32).collect();
        kinds.sort();
        assert_eq!(kinds, vec![0, 2, 3]);
    }

    #[test]
    fn test_unaligned_curve_nodes() {
        let mut builder = SceneBuilder::<Binary>::new()
            .with_leaf_size(2)
            .with_unaligned_curves(true);
        let object = builder.add_object(ObjectFlags::empty());
        for k in 0..4 {
            let y = k as f32 * 3.0;
            builder.add_curve(
                Target::Object(object),
                &[
                    CurveKey::new(Point3::new(0.0, y, 0.0), 0.05),
                    CurveKey::new(Point3::new(1.0, y + 1.0, 1.0), 0.05),
                    CurveKey::new(Point3::new(2.0, y + 2.0, 2.0), 0.05),
                ],
                0,
            );
        }
        let scene = builder.build().unwrap();
        assert!(scene.nodes().iter().any(|n| n.is_unaligned()));
    }

    #[test]
    fn test_instances_get_prototype_root() {
        let mut builder = SceneBuilder::<Quad>::new();
        let proto = builder.add_prototype();
        builder.add_triangle(
            Target::Prototype(proto),
            [Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            0,
        );
        let a = builder.add_instance(None, proto, Transform::identity());
        let b = builder.add_instance(None, proto, Transform::translation(0.0, 0.0, 5.0));
        let scene = builder.build().unwrap();
        let objects = scene.objects();
        assert_eq!(objects[a as usize].root, objects[b as usize].root);
        assert!(objects[a as usize].root.is_some());
        assert_eq!(scene.instance_depth(), 1);
        // Prototype primitives are owned by the first instance.
        assert_eq!(scene.prims().object[0], a);
    }

    #[test]
    fn test_empty_scene() {
        let scene = SceneBuilder::<Quad>::new().build().unwrap();
        assert_eq!(scene.nodes().len(), 1);
        assert!(scene.nodes()[0].child_refs().is_empty());
        assert_eq!(scene.stack_demand(), 0);
    }
}
