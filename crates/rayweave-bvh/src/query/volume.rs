//! Volume boundary queries: hits on objects that bound a volume.

use smallvec::SmallVec;

use super::keep_nearest;
use crate::config::TraversalConfig;
use crate::features::Features;
use crate::lanes::LaneWidth;
use crate::ray::{Intersection, Ray};
use crate::scene::{ObjectRecord, Scene};
use crate::traverse::{traverse, Control, QueryPolicy, Start, TraversalStats};

/// Closest hit on volume objects.
struct VolumeClosest {
    best: Option<Intersection>,
}

impl QueryPolicy for VolumeClosest {
    fn enters_instance(&self, _object: u32, record: &ObjectRecord) -> bool {
        record.has_volume()
    }

    fn accepts_primitive(&self, _object: u32, record: &ObjectRecord) -> bool {
        record.has_volume()
    }

    fn record(&mut self, hit: &Intersection, _address: u32, tmax: &mut f32) -> Control {
        if self.best.map_or(true, |best| hit.t < best.t) {
            *tmax = hit.t;
            self.best = Some(*hit);
        }
        Control::Continue
    }
}

/// Nearest boundary of a volume object along the ray.
pub(crate) fn intersect_volume_boundary<W: LaneWidth, F: Features>(
    scene: &Scene<W>,
    config: &TraversalConfig,
    ray: &Ray,
    stats: &mut TraversalStats,
) -> Option<Intersection> {
    let mut policy = VolumeClosest { best: None };
    traverse::<W, F, _>(scene, config, ray, Start::world(scene, ray), &mut policy, stats);
    policy.best
}

/// Nearest `max_hits` boundaries of volume objects.
struct VolumeAll {
    max_hits: usize,
    hits: SmallVec<[Intersection; 8]>,
}

impl QueryPolicy for VolumeAll {
    fn enters_instance(&self, _object: u32, record: &ObjectRecord) -> bool {
        record.has_volume()
    }

    fn accepts_primitive(&self, _object: u32, record: &ObjectRecord) -> bool {
        record.has_volume()
    }

    fn record(&mut self, hit: &Intersection, _address: u32, _tmax: &mut f32) -> Control {
        keep_nearest(&mut self.hits, self.max_hits, *hit, |h| h.t);
        Control::Continue
    }
}

/// Up to `max_hits` volume boundaries, nearest first.
pub(crate) fn intersect_volume_all<W: LaneWidth, F: Features>(
    scene: &Scene<W>,
    config: &TraversalConfig,
    ray: &Ray,
    max_hits: usize,
    stats: &mut TraversalStats,
) -> SmallVec<[Intersection; 8]> {
    let mut policy = VolumeAll {
        max_hits,
        hits: SmallVec::new(),
    };
    traverse::<W, F, _>(scene, config, ray, Start::world(scene, ray), &mut policy, stats);
    let mut hits = policy.hits;
    hits.sort_by(|a, b| a.t.total_cmp(&b.t));
    hits
}
