//! Closest-hit query.

use crate::config::TraversalConfig;
use crate::features::Features;
use crate::lanes::LaneWidth;
use crate::ray::{Intersection, Ray};
use crate::scene::Scene;
use crate::traverse::{traverse, Control, QueryPolicy, Start, TraversalStats};

/// Keeps the nearest hit and shrinks the interval to it.
struct Closest {
    best: Option<Intersection>,
}

impl QueryPolicy for Closest {
    fn record(&mut self, hit: &Intersection, _address: u32, tmax: &mut f32) -> Control {
        if self.best.map_or(true, |best| hit.t < best.t) {
            *tmax = hit.t;
            self.best = Some(*hit);
        }
        Control::Continue
    }
}

/// Nearest intersection along the ray.
pub(crate) fn intersect_closest<W: LaneWidth, F: Features>(
    scene: &Scene<W>,
    config: &TraversalConfig,
    ray: &Ray,
    stats: &mut TraversalStats,
) -> Option<Intersection> {
    let mut policy = Closest { best: None };
    traverse::<W, F, _>(scene, config, ray, Start::world(scene, ray), &mut policy, stats);
    policy.best
}
