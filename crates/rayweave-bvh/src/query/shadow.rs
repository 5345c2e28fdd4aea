//! Shadow queries: plain occlusion and transparent-shadow accumulation.

use smallvec::SmallVec;

use super::keep_nearest;
use crate::config::TraversalConfig;
use crate::features::Features;
use crate::lanes::LaneWidth;
use crate::node::PrimitiveKind;
use crate::ray::{Intersection, Ray, RaySelf};
use crate::scene::Scene;
use crate::traverse::{traverse, Control, QueryPolicy, Start, TraversalStats};

/// Result of a shadow-all query.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowHits {
    /// An opaque surface, or too many transparent ones, blocks the ray.
    pub occluded: bool,
    /// The nearest recorded transparent hits, sorted by distance.
    pub hits: SmallVec<[Intersection; 8]>,
    /// Transparent hits found, recorded or not.
    pub num_hits: u32,
    /// Product of the shadow transmission of the recorded hits; zero when occluded.
    pub throughput: f32,
}

impl ShadowHits {
    /// Result for a ray that is not traced.
    pub fn unoccluded() -> Self {
        Self {
            occluded: false,
            hits: SmallVec::new(),
            num_hits: 0,
            throughput: 1.0,
        }
    }

    /// Whether every transparent hit along the ray was recorded, so that
    /// `throughput` accounts for the whole segment.
    pub fn is_complete(&self) -> bool {
        self.occluded || self.num_hits as usize == self.hits.len()
    }
}

/// Stops at the first hit.
struct AnyHit {
    occluded: bool,
}

impl QueryPolicy for AnyHit {
    fn skips(&self, self_hit: &RaySelf, object: u32, kind: PrimitiveKind, prim: u32) -> bool {
        self_hit.skips_shadow(object, kind, prim)
    }

    fn record(&mut self, _hit: &Intersection, _address: u32, _tmax: &mut f32) -> Control {
        self.occluded = true;
        Control::Terminate
    }
}

/// Whether anything blocks the ray.
pub(crate) fn intersect_shadow<W: LaneWidth, F: Features>(
    scene: &Scene<W>,
    config: &TraversalConfig,
    ray: &Ray,
    stats: &mut TraversalStats,
) -> bool {
    let mut policy = AnyHit { occluded: false };
    traverse::<W, F, _>(scene, config, ray, Start::world(scene, ray), &mut policy, stats);
    policy.occluded
}

/// Records transparent hits; any opaque hit ends the query.
///
/// The interval is never shrunk, so an opaque surface behind the recorded
/// hits is still found.
struct ShadowAll<'a, W: LaneWidth> {
    scene: &'a Scene<W>,
    max_hits: usize,
    max_bounce: Option<u32>,
    hits: SmallVec<[(Intersection, f32); 8]>,
    num_hits: u32,
    occluded: bool,
}

impl<W: LaneWidth> QueryPolicy for ShadowAll<'_, W> {
    fn skips(&self, self_hit: &RaySelf, object: u32, kind: PrimitiveKind, prim: u32) -> bool {
        self_hit.skips_shadow(object, kind, prim)
    }

    fn record(&mut self, hit: &Intersection, address: u32, _tmax: &mut f32) -> Control {
        let shader = self.scene.shader_of(address);
        if !shader.is_transparent_shadow() {
            self.occluded = true;
            return Control::Terminate;
        }
        self.num_hits += 1;
        if self.max_bounce.is_some_and(|limit| self.num_hits > limit) {
            self.occluded = true;
            return Control::Terminate;
        }
        keep_nearest(&mut self.hits, self.max_hits, (*hit, shader.shadow_transmission), |e| e.0.t);
        Control::Continue
    }
}

/// Transparent hits up to `max_hits`, with occlusion and throughput.
pub(crate) fn intersect_shadow_all<W: LaneWidth, F: Features>(
    scene: &Scene<W>,
    config: &TraversalConfig,
    ray: &Ray,
    max_hits: usize,
    stats: &mut TraversalStats,
) -> ShadowHits {
    let mut policy = ShadowAll {
        scene,
        max_hits,
        max_bounce: config.transparent_max_bounce,
        hits: SmallVec::new(),
        num_hits: 0,
        occluded: false,
    };
    traverse::<W, F, _>(scene, config, ray, Start::world(scene, ray), &mut policy, stats);

    let mut recorded = policy.hits;
    recorded.sort_by(|a, b| a.0.t.total_cmp(&b.0.t));
    let throughput = if policy.occluded {
        0.0
    } else {
        recorded.iter().map(|(_, transmission)| transmission).product::<f32>()
    };
    ShadowHits {
        occluded: policy.occluded,
        hits: recorded.into_iter().map(|(hit, _)| hit).collect(),
        num_hits: policy.num_hits,
        throughput,
    }
}
