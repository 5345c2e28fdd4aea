#![warn(missing_docs)]

//! Stack-based BVH traversal for a production renderer.
//!
//! Given a prebuilt hierarchy of 2-, 4- or 8-wide nodes over triangles,
//! motion triangles, curves, points and instances, this crate answers ray
//! queries: closest hit, any hit for shadows, transparent-shadow
//! accumulation, volume boundaries and hits local to one object.
//!
//! # Architecture
//!
//! - [`Scene`] - validated read-only arrays: nodes, leaves, primitives, objects
//! - [`Kernel`] - a scene plus [`TraversalConfig`], dispatching to the
//!   smallest pre-specialised traversal for the scene's features
//! - [`LaneWidth`] - how many children a node holds and how they are tested
//! - [`Features`] - compile-time capability sets for instancing, motion,
//!   curves and points
//! - [`packed`] - flat byte layout of 2-wide hierarchies
//!
//! # Example
//!
//! ```
//! use rayweave_bvh::{
//!     Binary, Geometry, Kernel, LeafNode, Node, NodeRef, ObjectRecord, PrimitiveArrays,
//!     PrimitiveKind, Ray, Scene, SceneParts, TraversalConfig, Visibility,
//! };
//! use rayweave_math::{Aabb3, Point3, Vec3};
//!
//! let mut geometry = Geometry::default();
//! geometry.vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! geometry.triangles = vec![[0, 1, 2]];
//! let mut prims = PrimitiveArrays::default();
//! prims.push(0, 0, Visibility::ALL, 0);
//!
//! let bounds = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
//! let scene = Scene::<Binary>::new(SceneParts {
//!     nodes: vec![Node::aligned(&[(NodeRef::Leaf(0), bounds, Visibility::ALL)])],
//!     leaves: vec![LeafNode::primitives(PrimitiveKind::Triangle, 0, 1, Visibility::ALL)],
//!     root: NodeRef::Internal(0),
//!     prims,
//!     geometry,
//!     objects: vec![ObjectRecord::flattened()],
//!     shaders: Vec::new(),
//! })?;
//!
//! let kernel = Kernel::new(scene, TraversalConfig::default())?;
//! let hit = kernel
//!     .intersect_closest(&Ray::new(Point3::new(0.2, 0.2, -1.0), Vec3::z()))
//!     .unwrap();
//! assert_eq!(hit.t, 1.0);
//! # Ok::<(), rayweave_bvh::TraversalError>(())
//! ```

#[cfg(any(test, feature = "test-util"))]
pub mod builder;
mod config;
mod error;
mod features;
pub mod instance;
pub mod intersect;
mod kernel;
mod lanes;
mod nearfar;
mod node;
pub mod packed;
mod query;
mod ray;
mod rng;
mod scene;
mod stack;
mod traverse;

pub use config::TraversalConfig;
pub use error::{ConfigError, PrimitiveError, Result, SceneError, TraversalError};
pub use features::{FeatureSet, Features, Full, Instanced, InstancedMotion, Minimal, Variant};
pub use intersect::{CurveKey, Geometry, PointPrim, PrimHit};
pub use kernel::Kernel;
pub use lanes::{sort_nearest_first, Binary, LaneWidth, Octo, Quad};
pub use nearfar::NearFar;
pub use node::{LeafNode, Node, NodeBounds, NodeRef, PrimitiveKind, UnitSpace};
pub use query::{LocalHits, LocalSampling, ShadowHits};
pub use ray::{Intersection, Ray, RaySelf, Visibility, OBJECT_NONE, PRIM_NONE};
pub use rng::LcgState;
pub use scene::{
    ObjectFlags, ObjectRecord, PrimitiveArrays, Scene, SceneParts, ShaderFlags, ShaderRecord,
};
pub use stack::{StackEntry, MAX_INSTANCE_DEPTH, STACK_CAPACITY};
pub use traverse::TraversalStats;
