//! The query entry point.
//!
//! A [`Kernel`] owns a validated scene and a configuration and picks, once,
//! the smallest pre-specialised traversal covering the scene's features.
//! Every query then goes through a table of function pointers for that
//! variant.

use smallvec::SmallVec;

use crate::config::TraversalConfig;
use crate::error::{Result, SceneError};
use crate::features::{Features, Full, Instanced, InstancedMotion, Minimal, Variant};
use crate::lanes::LaneWidth;
use crate::query::closest::intersect_closest;
use crate::query::local::intersect_local;
use crate::query::shadow::{intersect_shadow, intersect_shadow_all};
use crate::query::volume::{intersect_volume_all, intersect_volume_boundary};
use crate::query::{LocalHits, LocalSampling, ShadowHits};
use crate::ray::{Intersection, Ray};
use crate::scene::{Scene, SceneParts};
use crate::traverse::TraversalStats;

type ClosestFn<W> =
    fn(&Scene<W>, &TraversalConfig, &Ray, &mut TraversalStats) -> Option<Intersection>;
type ShadowFn<W> = fn(&Scene<W>, &TraversalConfig, &Ray, &mut TraversalStats) -> bool;
type ShadowAllFn<W> =
    fn(&Scene<W>, &TraversalConfig, &Ray, usize, &mut TraversalStats) -> ShadowHits;
type VolumeAllFn<W> = fn(
    &Scene<W>,
    &TraversalConfig,
    &Ray,
    usize,
    &mut TraversalStats,
) -> SmallVec<[Intersection; 8]>;
type LocalFn<W> = for<'r> fn(
    &Scene<W>,
    &TraversalConfig,
    &Ray,
    u32,
    usize,
    LocalSampling<'r>,
    &mut TraversalStats,
) -> LocalHits;

/// Query functions monomorphised for one feature set.
struct DispatchTable<W: LaneWidth> {
    name: &'static str,
    closest: ClosestFn<W>,
    shadow: ShadowFn<W>,
    shadow_all: ShadowAllFn<W>,
    volume: ClosestFn<W>,
    volume_all: VolumeAllFn<W>,
    local: LocalFn<W>,
}

impl<W: LaneWidth> DispatchTable<W> {
    fn specialised<F: Features>() -> Self {
        Self {
            name: F::NAME,
            closest: intersect_closest::<W, F>,
            shadow: intersect_shadow::<W, F>,
            shadow_all: intersect_shadow_all::<W, F>,
            volume: intersect_volume_boundary::<W, F>,
            volume_all: intersect_volume_all::<W, F>,
            local: intersect_local::<W, F>,
        }
    }

    fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Minimal => Self::specialised::<Minimal>(),
            Variant::Instanced => Self::specialised::<Instanced>(),
            Variant::InstancedMotion => Self::specialised::<InstancedMotion>(),
            Variant::Full => Self::specialised::<Full>(),
        }
    }
}

/// A scene ready for ray queries.
///
/// Queries take `&self` and keep all traversal state on the call stack, so
/// one kernel can serve any number of threads.
pub struct Kernel<W: LaneWidth> {
    scene: Scene<W>,
    config: TraversalConfig,
    variant: Variant,
    table: DispatchTable<W>,
}

impl<W: LaneWidth> std::fmt::Debug for Kernel<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("width", &W::WIDTH)
            .field("variant", &self.variant)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<W: LaneWidth> Kernel<W> {
    /// Create a kernel for a validated scene.
    ///
    /// Fails when the configuration is invalid or the scene needs more
    /// stack entries than `config.stack_capacity`.
    pub fn new(scene: Scene<W>, config: TraversalConfig) -> Result<Self> {
        config.validate()?;
        if scene.stack_demand() > config.stack_capacity {
            return Err(SceneError::StackDemand {
                required: scene.stack_demand(),
                capacity: config.stack_capacity,
            }
            .into());
        }
        let variant = Variant::select(scene.features());
        let table = DispatchTable::for_variant(variant);
        log::debug!(
            "traversal kernel: {}-wide, {} for features {:?}, stack {}/{}",
            W::WIDTH,
            table.name,
            scene.features(),
            scene.stack_demand(),
            config.stack_capacity
        );
        Ok(Self {
            scene,
            config,
            variant,
            table,
        })
    }

    /// Validate raw scene arrays and create a kernel for them.
    pub fn from_parts(parts: SceneParts<W>, config: TraversalConfig) -> Result<Self> {
        Self::new(Scene::new(parts)?, config)
    }

    /// The scene.
    pub fn scene(&self) -> &Scene<W> {
        &self.scene
    }

    /// The configuration.
    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    /// The traversal variant selected for the scene.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    fn accepts(ray: &Ray) -> bool {
        let ok = ray.is_well_formed();
        if !ok {
            log::trace!("rejecting malformed ray {ray:?}");
        }
        ok
    }

    /// Nearest intersection along the ray.
    pub fn intersect_closest(&self, ray: &Ray) -> Option<Intersection> {
        self.intersect_closest_with_stats(ray).0
    }

    /// Nearest intersection along the ray, with traversal counters.
    pub fn intersect_closest_with_stats(
        &self,
        ray: &Ray,
    ) -> (Option<Intersection>, TraversalStats) {
        let mut stats = TraversalStats::default();
        if !Self::accepts(ray) {
            return (None, stats);
        }
        let hit = (self.table.closest)(&self.scene, &self.config, ray, &mut stats);
        (hit, stats)
    }

    /// Whether anything blocks the ray. The origin surface and the light in
    /// [`RaySelf`](crate::RaySelf) never do.
    pub fn intersect_shadow(&self, ray: &Ray) -> bool {
        self.intersect_shadow_with_stats(ray).0
    }

    /// Occlusion test with traversal counters.
    pub fn intersect_shadow_with_stats(&self, ray: &Ray) -> (bool, TraversalStats) {
        let mut stats = TraversalStats::default();
        if !Self::accepts(ray) {
            return (false, stats);
        }
        let occluded = (self.table.shadow)(&self.scene, &self.config, ray, &mut stats);
        (occluded, stats)
    }

    /// Transparent-shadow query.
    ///
    /// Any surface whose shader does not cast transparent shadows occludes
    /// the ray. Transparent hits are counted and the nearest `max_hits` are
    /// recorded, sorted by distance.
    pub fn intersect_shadow_all(&self, ray: &Ray, max_hits: usize) -> ShadowHits {
        if !Self::accepts(ray) {
            return ShadowHits::unoccluded();
        }
        let mut stats = TraversalStats::default();
        (self.table.shadow_all)(&self.scene, &self.config, ray, max_hits, &mut stats)
    }

    /// Nearest boundary of an object flagged as bounding a volume.
    pub fn intersect_volume_boundary(&self, ray: &Ray) -> Option<Intersection> {
        if !Self::accepts(ray) {
            return None;
        }
        let mut stats = TraversalStats::default();
        (self.table.volume)(&self.scene, &self.config, ray, &mut stats)
    }

    /// Nearest `max_hits` volume boundaries, sorted by distance.
    pub fn intersect_volume_all(&self, ray: &Ray, max_hits: usize) -> SmallVec<[Intersection; 8]> {
        if !Self::accepts(ray) {
            return SmallVec::new();
        }
        let mut stats = TraversalStats::default();
        (self.table.volume_all)(&self.scene, &self.config, ray, max_hits, &mut stats)
    }

    /// Hits on `object` only.
    ///
    /// See [`LocalSampling`] for how hits are chosen when there are more
    /// than `max_hits`. With `max_hits == 0` the query stops at the first
    /// hit and only `num_hits` is reported.
    pub fn intersect_local(
        &self,
        ray: &Ray,
        object: u32,
        max_hits: usize,
        sampling: LocalSampling<'_>,
    ) -> LocalHits {
        if !Self::accepts(ray) {
            return LocalHits::default();
        }
        let mut stats = TraversalStats::default();
        (self.table.local)(
            &self.scene,
            &self.config,
            ray,
            object,
            max_hits,
            sampling,
            &mut stats,
        )
    }
}
