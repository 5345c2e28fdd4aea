//! Lane widths: batched child tests for 2-, 4- and 8-wide nodes.
//!
//! Every width gets a scalar per-child implementation. With the `simd`
//! feature the 4- and 8-wide aligned tests run on `wide` vectors instead.

use std::fmt::Debug;

use crate::node::{NodeRef, UnitSpace};
use crate::node_test::{intersect_aabb, intersect_unit_box, SlabRay};

/// Per-width storage and child tests.
pub trait LaneWidth: Copy + Debug + Default + Send + Sync + 'static {
    /// Children per node.
    const WIDTH: usize;
    /// One `f32` per child.
    type Floats: Copy + Default + Debug + Send + Sync + AsRef<[f32]> + AsMut<[f32]>;
    /// One child reference per child.
    type Refs: Copy + Debug + Send + Sync + AsRef<[NodeRef]> + AsMut<[NodeRef]>;
    /// One visibility mask per child.
    type Masks: Copy + Default + Debug + Send + Sync + AsRef<[u32]> + AsMut<[u32]>;
    /// One unit-box space per child.
    type Spaces: Copy + Default + Debug + Send + Sync + AsRef<[UnitSpace]> + AsMut<[UnitSpace]>;
    /// Ray data broadcast across lanes, rebuilt whenever the traversal ray
    /// is replaced.
    type RaySplat: Copy + Debug;

    /// Child references with every slot pointing at leaf zero.
    fn empty_refs() -> Self::Refs;

    /// Broadcast the ray origin and inverse direction.
    fn splat(ray: &SlabRay) -> Self::RaySplat;

    /// Test the ray against every aligned child box.
    ///
    /// Returns a bit mask of hit lanes and writes their entry distances into
    /// `tnear`. Lanes not set in the mask hold unspecified values.
    fn intersect_aligned(
        slots: &[[Self::Floats; 3]; 2],
        ray: &SlabRay,
        _splat: &Self::RaySplat,
        robust_epsilon: Option<f32>,
        tnear: &mut Self::Floats,
    ) -> u32 {
        let mut mask = 0;
        for lane in 0..Self::WIDTH {
            let mut corners = [[0.0; 3]; 2];
            for (slot, corner) in corners.iter_mut().enumerate() {
                for axis in 0..3 {
                    corner[axis] = slots[slot][axis].as_ref()[lane];
                }
            }
            if let Some(t) = intersect_aabb(&corners, ray, robust_epsilon) {
                mask |= 1 << lane;
                tnear.as_mut()[lane] = t;
            }
        }
        mask
    }

    /// Test the ray against every unaligned child space.
    fn intersect_unaligned(
        spaces: &Self::Spaces,
        ray: &SlabRay,
        robust_epsilon: Option<f32>,
        tnear: &mut Self::Floats,
    ) -> u32 {
        let mut mask = 0;
        for (lane, space) in spaces.as_ref().iter().enumerate() {
            if let Some(t) = intersect_unit_box(space, ray, robust_epsilon) {
                mask |= 1 << lane;
                tnear.as_mut()[lane] = t;
            }
        }
        mask
    }
}

/// Sort children nearest first with an odd-even transposition network.
///
/// `dist` and `refs` are permuted together; both must have the same length.
#[inline]
pub fn sort_nearest_first(dist: &mut [f32], refs: &mut [NodeRef]) {
    let n = dist.len().min(refs.len());
    for pass in 0..n {
        let mut i = pass & 1;
        while i + 1 < n {
            if dist[i + 1] < dist[i] {
                dist.swap(i, i + 1);
                refs.swap(i, i + 1);
            }
            i += 2;
        }
    }
}

macro_rules! lane_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;
    };
}

lane_type!(
    /// Binary hierarchy: two children per node.
    Binary
);
lane_type!(
    /// Four children per node.
    Quad
);
lane_type!(
    /// Eight children per node.
    Octo
);

macro_rules! scalar_lanes {
    ($name:ident, $n:literal) => {
        impl LaneWidth for $name {
            const WIDTH: usize = $n;
            type Floats = [f32; $n];
            type Refs = [NodeRef; $n];
            type Masks = [u32; $n];
            type Spaces = [UnitSpace; $n];
            type RaySplat = ();

            fn empty_refs() -> Self::Refs {
                [NodeRef::Leaf(0); $n]
            }

            #[inline]
            fn splat(_ray: &SlabRay) -> Self::RaySplat {}
        }
    };
}

scalar_lanes!(Binary, 2);

#[cfg(not(feature = "simd"))]
scalar_lanes!(Quad, 4);
#[cfg(not(feature = "simd"))]
scalar_lanes!(Octo, 8);

#[cfg(feature = "simd")]
mod simd {
    use wide::{f32x4, f32x8, CmpLe};

    use super::{LaneWidth, Octo, Quad};
    use crate::node::{NodeRef, UnitSpace};
    use crate::node_test::SlabRay;

    /// Origin and inverse direction broadcast over every lane.
    #[derive(Debug, Clone, Copy)]
    pub struct Splat<V> {
        origin: [V; 3],
        idir: [V; 3],
    }

    macro_rules! wide_lanes {
        ($name:ident, $n:literal, $v:ident) => {
            impl LaneWidth for $name {
                const WIDTH: usize = $n;
                type Floats = [f32; $n];
                type Refs = [NodeRef; $n];
                type Masks = [u32; $n];
                type Spaces = [UnitSpace; $n];
                type RaySplat = Splat<$v>;

                fn empty_refs() -> Self::Refs {
                    [NodeRef::Leaf(0); $n]
                }

                #[inline]
                fn splat(ray: &SlabRay) -> Self::RaySplat {
                    Splat {
                        origin: [
                            $v::splat(ray.origin.x),
                            $v::splat(ray.origin.y),
                            $v::splat(ray.origin.z),
                        ],
                        idir: [
                            $v::splat(ray.idir.x),
                            $v::splat(ray.idir.y),
                            $v::splat(ray.idir.z),
                        ],
                    }
                }

                #[inline]
                fn intersect_aligned(
                    slots: &[[Self::Floats; 3]; 2],
                    ray: &SlabRay,
                    splat: &Self::RaySplat,
                    robust_epsilon: Option<f32>,
                    tnear: &mut Self::Floats,
                ) -> u32 {
                    let nf = &ray.near_far;
                    let mut t_enter = $v::splat(ray.tmin);
                    let mut t_exit = $v::splat(ray.tmax);
                    for axis in 0..3 {
                        let near = $v::from(slots[nf.near[axis]][axis]);
                        let far = $v::from(slots[nf.far[axis]][axis]);
                        t_enter = t_enter.max((near - splat.origin[axis]) * splat.idir[axis]);
                        t_exit = t_exit.min((far - splat.origin[axis]) * splat.idir[axis]);
                    }
                    let hit = match robust_epsilon {
                        None => t_enter.cmp_le(t_exit),
                        Some(eps) => (t_enter * $v::splat(1.0 - eps))
                            .cmp_le(t_exit * $v::splat(1.0 + eps)),
                    };
                    *tnear = t_enter.to_array();
                    hit.move_mask() as u32
                }
            }
        };
    }

    wide_lanes!(Quad, 4, f32x4);
    wide_lanes!(Octo, 8, f32x8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rayweave_math::{Aabb3, Point3, Vec3};

    use crate::node::{Node, NodeBounds};
    use crate::ray::Visibility;

    fn random_box(rng: &mut StdRng) -> Aabb3 {
        let c = Point3::new(
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
        );
        let h = Vec3::new(rng.gen_range(0.1..2.0), rng.gen_range(0.1..2.0), rng.gen_range(0.1..2.0));
        Aabb3::new(c - h, c + h)
    }

    fn check_width<W: LaneWidth>() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let boxes: Vec<Aabb3> = (0..W::WIDTH).map(|_| random_box(&mut rng)).collect();
            let children: Vec<_> = boxes
                .iter()
                .enumerate()
                .map(|(i, b)| (NodeRef::Leaf(i as u32), *b, Visibility::ALL))
                .collect();
            let node: Node<W> = Node::aligned(&children);
            let NodeBounds::Aligned { slots } = &node.bounds else {
                panic!("expected aligned node");
            };
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let ray = SlabRay::new(Point3::new(0.0, 0.0, -9.0), dir, 0.0, rng.gen_range(1.0..30.0));
            let mut tnear = W::Floats::default();
            let mask = W::intersect_aligned(slots, &ray, &W::splat(&ray), None, &mut tnear);
            for (lane, b) in boxes.iter().enumerate() {
                let corners = [[b.min.x, b.min.y, b.min.z], [b.max.x, b.max.y, b.max.z]];
                let expected = intersect_aabb(&corners, &ray, None);
                assert_eq!(mask & (1 << lane) != 0, expected.is_some(), "lane {lane}");
                if let Some(t) = expected {
                    assert!((tnear.as_ref()[lane] - t).abs() <= 1e-5 * t.abs().max(1.0));
                }
            }
        }
    }

    #[test]
    fn test_batched_matches_scalar() {
        check_width::<Binary>();
        check_width::<Quad>();
        check_width::<Octo>();
    }

    #[test]
    fn test_empty_lanes_never_hit() {
        let b = Aabb3::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let node: Node<Octo> = Node::aligned(&[(NodeRef::Leaf(0), b, Visibility::ALL)]);
        let NodeBounds::Aligned { slots } = &node.bounds else {
            panic!("expected aligned node");
        };
        for dir in [Vec3::z(), -Vec3::z(), Vec3::new(0.2, -0.3, 1.0)] {
            let ray = SlabRay::new(Point3::new(0.0, 0.0, -3.0 * dir.z.signum()), dir, 0.0, 100.0);
            let mut tnear = [0.0; 8];
            let mask = Octo::intersect_aligned(slots, &ray, &Octo::splat(&ray), None, &mut tnear);
            assert_eq!(mask, 1);
        }
    }

    #[test]
    fn test_sorting_network() {
        let mut dist = [4.0, 1.0, 3.0, 0.5, 2.0];
        let mut refs: Vec<NodeRef> = (0..5).map(NodeRef::Internal).collect();
        sort_nearest_first(&mut dist, &mut refs);
        assert_eq!(dist, [0.5, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            refs,
            vec![
                NodeRef::Internal(3),
                NodeRef::Internal(1),
                NodeRef::Internal(4),
                NodeRef::Internal(2),
                NodeRef::Internal(0)
            ]
        );
    }

    #[test]
    fn test_sorting_network_random() {
        let mut rng = StdRng::seed_from_u64(3);
        for n in 0..=8 {
            let mut dist: Vec<f32> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
            let mut refs: Vec<NodeRef> = (0..n as u32).map(NodeRef::Leaf).collect();
            let original = dist.clone();
            sort_nearest_first(&mut dist, &mut refs);
            assert!(dist.windows(2).all(|w| w[0] <= w[1]));
            for (d, r) in dist.iter().zip(&refs) {
                let NodeRef::Leaf(i) = r else { unreachable!() };
                assert_eq!(original[*i as usize], *d);
            }
        }
    }
}
