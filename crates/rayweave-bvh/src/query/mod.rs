//! Query policies run by the traversal loop.

pub(crate) mod closest;
pub(crate) mod local;
pub(crate) mod shadow;
pub(crate) mod volume;

use smallvec::{Array, SmallVec};

pub use local::{LocalHits, LocalSampling};
pub use shadow::ShadowHits;

/// Record `item` while fewer than `max_hits` are held, otherwise replace the
/// farthest held item if `item` is nearer.
pub(crate) fn keep_nearest<A: Array>(
    hits: &mut SmallVec<A>,
    max_hits: usize,
    item: A::Item,
    t_of: impl Fn(&A::Item) -> f32,
) {
    if hits.len() < max_hits {
        hits.push(item);
        return;
    }
    let farthest = hits
        .iter()
        .enumerate()
        .max_by(|a, b| t_of(a.1).total_cmp(&t_of(b.1)))
        .map(|(i, h)| (i, t_of(h)));
    if let Some((slot, t)) = farthest {
        if t_of(&item) < t {
            hits[slot] = item;
        }
    }
}
