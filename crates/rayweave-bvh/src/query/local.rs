//! Local queries: hits restricted to a single object.
//!
//! Used for subsurface scattering and bevel-style effects, which need a
//! bounded sample of the surfaces of one object along a short probe ray.

use smallvec::SmallVec;

use crate::config::TraversalConfig;
use crate::features::Features;
use crate::instance::enter_object;
use crate::lanes::LaneWidth;
use crate::node::PrimitiveKind;
use crate::node_test::SlabRay;
use crate::ray::{Intersection, Ray, RaySelf};
use crate::rng::LcgState;
use crate::scene::{ObjectRecord, Scene};
use crate::traverse::{traverse, Control, QueryPolicy, Start, TraversalStats};

/// How a local query picks hits once more than `max_hits` are found.
#[derive(Debug)]
pub enum LocalSampling<'r> {
    /// Keep the nearest hits.
    Nearest,
    /// Keep the first hits found and stop.
    First,
    /// Keep a uniform random subset.
    Reservoir(&'r mut LcgState),
}

/// Result of a local query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalHits {
    /// Recorded hits, sorted by distance.
    pub hits: SmallVec<[Intersection; 4]>,
    /// Total hits found, recorded or not.
    pub num_hits: u32,
}

struct Local<'r> {
    object: u32,
    filter_by_object: bool,
    max_hits: usize,
    sampling: LocalSampling<'r>,
    hits: SmallVec<[Intersection; 4]>,
    num_hits: u32,
}

fn farthest(hits: &[Intersection]) -> Option<(usize, f32)> {
    hits.iter()
        .enumerate()
        .map(|(i, h)| (i, h.t))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

impl QueryPolicy for Local<'_> {
    fn enters_instance(&self, _object: u32, _record: &ObjectRecord) -> bool {
        false
    }

    fn accepts_primitive(&self, object: u32, _record: &ObjectRecord) -> bool {
        !self.filter_by_object || object == self.object
    }

    fn skips(&self, self_hit: &RaySelf, _object: u32, kind: PrimitiveKind, prim: u32) -> bool {
        self_hit.skips_local(kind, prim)
    }

    fn record(&mut self, hit: &Intersection, _address: u32, tmax: &mut f32) -> Control {
        self.num_hits += 1;
        if self.max_hits == 0 {
            return Control::Terminate;
        }
        match &mut self.sampling {
            LocalSampling::First => {
                self.hits.push(*hit);
                if self.hits.len() >= self.max_hits {
                    return Control::Terminate;
                }
            }
            LocalSampling::Nearest => {
                if self.hits.len() < self.max_hits {
                    self.hits.push(*hit);
                } else if let Some((slot, t)) = farthest(&self.hits) {
                    if hit.t < t {
                        self.hits[slot] = *hit;
                    }
                }
                if self.hits.len() == self.max_hits {
                    if let Some((_, t)) = farthest(&self.hits) {
                        *tmax = t;
                    }
                }
            }
            LocalSampling::Reservoir(lcg) => {
                if self.hits.len() < self.max_hits {
                    self.hits.push(*hit);
                } else {
                    let slot = (lcg.next_u32() % self.num_hits) as usize;
                    if slot < self.max_hits {
                        self.hits[slot] = *hit;
                    }
                }
            }
        }
        Control::Continue
    }
}

/// Hits on `object` only, sampled according to `sampling`.
///
/// Instanced objects are traversed through their own hierarchy with the ray
/// carried into object space; other objects are found in the top-level
/// hierarchy by primitive ownership. Nested instances are not entered.
/// `max_hits == 0` only reports whether anything is hit.
pub(crate) fn intersect_local<W: LaneWidth, F: Features>(
    scene: &Scene<W>,
    config: &TraversalConfig,
    ray: &Ray,
    object: u32,
    max_hits: usize,
    sampling: LocalSampling<'_>,
    stats: &mut TraversalStats,
) -> LocalHits {
    let Some(record) = scene.objects().get(object as usize) else {
        return LocalHits::default();
    };
    let world = SlabRay::new(ray.origin, ray.direction, ray.tmin, ray.tmax);
    let (start, filter_by_object) = match record.root {
        Some(root) => (
            Start {
                root,
                ray: enter_object::<F>(record, &world, ray.time),
                object: Some(object),
            },
            false,
        ),
        None => (Start::world(scene, ray), true),
    };
    let mut policy = Local {
        object,
        filter_by_object,
        max_hits,
        sampling,
        hits: SmallVec::new(),
        num_hits: 0,
    };
    traverse::<W, F, _>(scene, config, ray, start, &mut policy, stats);
    let mut hits = policy.hits;
    hits.sort_by(|a, b| a.t.total_cmp(&b.t));
    LocalHits {
        hits,
        num_hits: policy.num_hits,
    }
}
