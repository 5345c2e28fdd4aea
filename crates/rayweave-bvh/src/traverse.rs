//! The traversal loop shared by every query.
//!
//! One iterative, stack-based walk handles all widths, feature sets and
//! query kinds. What a hit means is left to a [`QueryPolicy`]: it filters
//! objects and primitives, records hits, shrinks the interval and decides
//! when to stop.

use crate::config::TraversalConfig;
use crate::features::Features;
use crate::instance::{enter_object, exit_object};
use crate::lanes::{sort_nearest_first, LaneWidth};
use crate::node::{NodeBounds, NodeRef, PrimitiveKind};
use crate::node_test::SlabRay;
use crate::ray::{Intersection, Ray, RaySelf};
use crate::scene::{ObjectRecord, Scene};
use crate::stack::{InstanceFrame, InstanceStack, StackEntry, TraversalStack};

/// Counters collected during one query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TraversalStats {
    /// Internal nodes whose children were tested.
    pub nodes_visited: usize,
    /// Primitive leaves reached.
    pub leaves_visited: usize,
    /// Primitive addresses examined.
    pub primitives_tested: usize,
    /// Instances entered.
    pub instances_entered: usize,
    /// Stack entries dropped because they start beyond the current interval.
    pub entries_culled: usize,
    /// Largest entry distance of any primitive leaf reached.
    pub max_leaf_tnear: f32,
}

/// Whether traversal goes on after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Continue,
    Terminate,
}

/// Query-specific behaviour plugged into [`traverse`].
pub(crate) trait QueryPolicy {
    /// Whether to descend into an instance of `object`.
    fn enters_instance(&self, _object: u32, _record: &ObjectRecord) -> bool {
        true
    }

    /// Whether primitives owned by `object` are considered at all.
    fn accepts_primitive(&self, _object: u32, _record: &ObjectRecord) -> bool {
        true
    }

    /// Self-intersection rule.
    fn skips(&self, self_hit: &RaySelf, object: u32, kind: PrimitiveKind, prim: u32) -> bool {
        self_hit.skips(object, kind, prim)
    }

    /// Handle a hit inside the current interval. `tmax` may be shrunk.
    fn record(&mut self, hit: &Intersection, address: u32, tmax: &mut f32) -> Control;
}

/// Where a traversal begins.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Start {
    pub(crate) root: NodeRef,
    pub(crate) ray: SlabRay,
    pub(crate) object: Option<u32>,
}

impl Start {
    /// Top-level hierarchy in world space.
    pub(crate) fn world<W: LaneWidth>(scene: &Scene<W>, ray: &Ray) -> Self {
        Self {
            root: scene.root(),
            ray: SlabRay::new(ray.origin, ray.direction, ray.tmin, ray.tmax),
            object: None,
        }
    }
}

/// Walk the hierarchy from `start`, feeding hits to `policy`.
pub(crate) fn traverse<W, F, P>(
    scene: &Scene<W>,
    config: &TraversalConfig,
    ray: &Ray,
    start: Start,
    policy: &mut P,
    stats: &mut TraversalStats,
) where
    W: LaneWidth,
    F: Features,
    P: QueryPolicy,
{
    let robust_epsilon = config.robust_epsilon;
    let visibility = ray.visibility;
    let mut stack = TraversalStack::new(config.stack_capacity);
    let mut frames = InstanceStack::new();
    let mut tray = start.ray;
    let mut splat = W::splat(&tray);
    let mut object = start.object;
    let mut next = Some((start.root, tray.tmin));

    loop {
        let (node_ref, tnear) = match next.take() {
            Some(entry) => entry,
            None => match stack.pop() {
                None => return,
                Some(StackEntry::Node { node, tnear }) => {
                    if tnear > tray.tmax {
                        stats.entries_culled += 1;
                        continue;
                    }
                    (node, tnear)
                }
                Some(StackEntry::InstanceReturn) => {
                    if let Some(frame) = frames.pop() {
                        tray = exit_object(&frame.ray, tray.tmax);
                        splat = W::splat(&tray);
                        object = frame.object;
                    }
                    continue;
                }
            },
        };

        match node_ref {
            NodeRef::Internal(index) => {
                stats.nodes_visited += 1;
                let node = &scene.nodes()[index as usize];
                let mut dist = W::Floats::default();
                let hit_mask = match &node.bounds {
                    NodeBounds::Aligned { slots } => {
                        W::intersect_aligned(slots, &tray, &splat, robust_epsilon, &mut dist)
                    }
                    NodeBounds::Unaligned { spaces } => {
                        W::intersect_unaligned(spaces, &tray, robust_epsilon, &mut dist)
                    }
                } & node.visible_mask(visibility);
                if hit_mask == 0 {
                    continue;
                }

                let mut refs = W::empty_refs();
                let mut order = W::Floats::default();
                let mut count = 0;
                for lane in 0..W::WIDTH {
                    if hit_mask & (1 << lane) != 0 {
                        refs.as_mut()[count] = node.children.as_ref()[lane];
                        order.as_mut()[count] = dist.as_ref()[lane];
                        count += 1;
                    }
                }
                sort_nearest_first(&mut order.as_mut()[..count], &mut refs.as_mut()[..count]);
                for j in (1..count).rev() {
                    stack.push(StackEntry::Node {
                        node: refs.as_ref()[j],
                        tnear: order.as_ref()[j],
                    });
                }
                next = Some((refs.as_ref()[0], order.as_ref()[0]));
            }
            NodeRef::Leaf(index) => {
                let leaf = &scene.leaves()[index as usize];
                if !leaf.visibility.intersects(visibility) {
                    continue;
                }

                if leaf.kind == PrimitiveKind::Instance {
                    if !F::INSTANCING {
                        continue;
                    }
                    let id = leaf.start;
                    let record = &scene.objects()[id as usize];
                    if !record.visibility.intersects(visibility) || !policy.enters_instance(id, record) {
                        continue;
                    }
                    let Some(root) = record.root else {
                        continue;
                    };
                    frames.push(InstanceFrame { ray: tray, object });
                    stack.push(StackEntry::InstanceReturn);
                    tray = enter_object::<F>(record, &tray, ray.time);
                    splat = W::splat(&tray);
                    object = Some(id);
                    stats.instances_entered += 1;
                    next = Some((root, tray.tmin));
                    continue;
                }

                stats.leaves_visited += 1;
                stats.max_leaf_tnear = stats.max_leaf_tnear.max(tnear);
                let prims = scene.prims();
                for address in leaf.start..leaf.end {
                    let a = address as usize;
                    stats.primitives_tested += 1;
                    if !prims.visibility[a].intersects(visibility) {
                        continue;
                    }
                    let owner = object.unwrap_or(prims.object[a]);
                    let record = &scene.objects()[owner as usize];
                    if !record.visibility.intersects(visibility) {
                        continue;
                    }
                    let prim = prims.index[a];
                    if !policy.accepts_primitive(owner, record)
                        || policy.skips(&ray.self_hit, owner, leaf.kind, prim)
                    {
                        continue;
                    }
                    let Some(h) = scene.geometry().intersect::<F>(leaf.kind, prim, &tray, ray.time)
                    else {
                        continue;
                    };
                    let hit = Intersection {
                        t: h.t,
                        u: h.u,
                        v: h.v,
                        prim,
                        object: owner,
                        kind: leaf.kind,
                    };
                    if policy.record(&hit, address, &mut tray.tmax) == Control::Terminate {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Minimal;
    use crate::intersect::Geometry;
    use crate::lanes::Binary;
    use crate::node::{LeafNode, Node};
    use crate::ray::Visibility;
    use crate::scene::{PrimitiveArrays, SceneParts};
    use rayweave_math::{Aabb3, Point3, Vec3};

    struct Collect(Vec<Intersection>);

    impl QueryPolicy for Collect {
        fn record(&mut self, hit: &Intersection, _address: u32, _tmax: &mut f32) -> Control {
            self.0.push(*hit);
            Control::Continue
        }
    }

    /// Two unit squares facing +z at z = 0 and z = -2, one leaf each.
    fn two_layers(child_visibility: [Visibility; 2]) -> Scene<Binary> {
        let mut geometry = Geometry::default();
        let mut prims = PrimitiveArrays::default();
        let mut children = Vec::new();
        let mut leaves = Vec::new();
        for (layer, z) in [0.0f32, -2.0].into_iter().enumerate() {
            let base = geometry.vertices.len() as u32;
            geometry.vertices.extend([
                Point3::new(-1.0, -1.0, z),
                Point3::new(1.0, -1.0, z),
                Point3::new(1.0, 1.0, z),
                Point3::new(-1.0, 1.0, z),
            ]);
            let first = geometry.triangles.len() as u32;
            geometry.triangles.push([base, base + 1, base + 2]);
            geometry.triangles.push([base, base + 2, base + 3]);
            prims.push(first, 0, Visibility::ALL, 0);
            prims.push(first + 1, 0, Visibility::ALL, 0);
            let start = 2 * layer as u32;
            leaves.push(LeafNode::primitives(PrimitiveKind::Triangle, start, start + 2, Visibility::ALL));
            let bounds = Aabb3::new(Point3::new(-1.0, -1.0, z), Point3::new(1.0, 1.0, z));
            children.push((NodeRef::Leaf(layer as u32), bounds, child_visibility[layer]));
        }
        Scene::new(SceneParts {
            nodes: vec![Node::aligned(&children)],
            leaves,
            root: NodeRef::Internal(0),
            prims,
            geometry,
            objects: vec![ObjectRecord::flattened()],
            shaders: Vec::new(),
        })
        .unwrap()
    }

    fn run(scene: &Scene<Binary>, ray: &Ray) -> (Vec<Intersection>, TraversalStats) {
        let mut policy = Collect(Vec::new());
        let mut stats = TraversalStats::default();
        traverse::<Binary, Minimal, _>(
            scene,
            &TraversalConfig::default(),
            ray,
            Start::world(scene, ray),
            &mut policy,
            &mut stats,
        );
        (policy.0, stats)
    }

    #[test]
    fn test_visits_near_child_first() {
        let scene = two_layers([Visibility::ALL; 2]);
        let down = Ray::new(Point3::new(0.2, 0.1, 5.0), -Vec3::z());
        let (hits, stats) = run(&scene, &down);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].t < hits[1].t);
        assert_eq!(stats.nodes_visited, 1);
        assert_eq!(stats.leaves_visited, 2);

        let up = Ray::new(Point3::new(0.2, 0.1, -5.0), Vec3::z());
        let (hits, _) = run(&scene, &up);
        assert!(hits[0].t < hits[1].t);
        assert_eq!(hits[0].prim / 2, 1);
    }

    #[test]
    fn test_child_visibility_mask() {
        let scene = two_layers([Visibility::CAMERA, Visibility::ALL]);
        let ray = Ray::new(Point3::new(0.2, 0.1, 5.0), -Vec3::z()).with_visibility(Visibility::SHADOW);
        let (hits, _) = run(&scene, &ray);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].t - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_self_hit_skipped() {
        let scene = two_layers([Visibility::ALL; 2]);
        let first = run(&scene, &Ray::new(Point3::new(0.2, 0.1, 5.0), -Vec3::z())).0[0];
        let ray = Ray::new(Point3::new(0.2, 0.1, 0.0), -Vec3::z()).with_self(RaySelf::from_hit(&first));
        let (hits, _) = run(&scene, &ray);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].prim >= 2);
    }
}
