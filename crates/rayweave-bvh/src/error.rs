//! Error types for scene validation and kernel configuration.
//!
//! Queries never fail: a malformed ray or a filtered primitive is simply a
//! miss. Everything here is reported once, when the read-only scene arrays
//! are handed to the engine or when a kernel is configured.

use thiserror::Error;

use crate::node::PrimitiveKind;

/// A primitive whose storage is incomplete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveError {
    /// The index is past the end of the buffer for its kind.
    #[error("{kind:?} index {index} out of range ({count} stored)")]
    IndexOutOfRange {
        /// Primitive kind.
        kind: PrimitiveKind,
        /// Index within the kind's buffer.
        index: u32,
        /// Buffer length.
        count: usize,
    },

    /// A triangle corner names a vertex that is not stored.
    #[error("{kind:?} {index} references missing vertex {vertex}")]
    MissingVertex {
        /// Triangle or motion triangle.
        kind: PrimitiveKind,
        /// Index within the kind's buffer.
        index: u32,
        /// Offending vertex index.
        vertex: u32,
    },

    /// Motion triangles are present but no vertex keys are.
    #[error("motion triangles without vertex keys")]
    NoMotionSteps,

    /// A curve segment names a control key that is not stored.
    #[error("curve segment {index} references missing key {key}")]
    MissingKey {
        /// Segment index.
        index: u32,
        /// Offending key index.
        key: u32,
    },

    /// The primitive's shader is not in the shader table.
    #[error("shader {shader} out of range ({count} shaders)")]
    UnknownShader {
        /// Shader index.
        shader: u32,
        /// Number of shaders.
        count: usize,
    },
}

/// Structural problems found while validating scene arrays.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// A node reference points past the end of the node array.
    #[error("node reference {index} out of range ({count} nodes)")]
    DanglingNode {
        /// Referenced node index.
        index: u32,
        /// Number of nodes in the scene.
        count: usize,
    },

    /// A leaf reference points past the end of the leaf array.
    #[error("leaf reference {index} out of range ({count} leaves)")]
    DanglingLeaf {
        /// Referenced leaf index.
        index: u32,
        /// Number of leaves in the scene.
        count: usize,
    },

    /// A node declares more children than its width allows.
    #[error("node {node} has {count} children, width is {width}")]
    ChildCount {
        /// Node index.
        node: u32,
        /// Declared child count.
        count: u8,
        /// Lane width of the hierarchy.
        width: usize,
    },

    /// A leaf's primitive range is inverted or exceeds the primitive arrays.
    #[error("leaf {leaf} primitive range {start}..{end} invalid ({count} primitives)")]
    PrimitiveRange {
        /// Leaf index.
        leaf: u32,
        /// Range start.
        start: u32,
        /// Range end.
        end: u32,
        /// Number of primitive addresses.
        count: usize,
    },

    /// An instance leaf must reference exactly one object.
    #[error("instance leaf {leaf} must reference exactly one object, got {start}..{end}")]
    InstanceRange {
        /// Leaf index.
        leaf: u32,
        /// Range start.
        start: u32,
        /// Range end.
        end: u32,
    },

    /// An object index is out of range.
    #[error("object {object} out of range ({count} objects)")]
    UnknownObject {
        /// Object index.
        object: u32,
        /// Number of objects.
        count: usize,
    },

    /// A primitive references storage that does not exist.
    #[error("primitive address {address}: {source}")]
    Primitive {
        /// Primitive address.
        address: u32,
        /// What is wrong with it.
        source: PrimitiveError,
    },

    /// The primitive attribute arrays disagree in length.
    #[error("primitive attribute arrays disagree in length: {0}")]
    AttributeLength(String),

    /// An instance leaf references an object without a hierarchy of its own.
    #[error("object {0} is instanced but has no root node")]
    MissingRoot(u32),

    /// Following child references leads back to a node already on the path.
    #[error("node {0} is its own ancestor")]
    NodeCycle(u32),

    /// An object transform cannot be inverted or is not finite.
    #[error("object {0} has a degenerate transform")]
    DegenerateTransform(u32),

    /// Following instance leaves leads back to an object already being entered.
    #[error("instance cycle through object {0}")]
    InstanceCycle(u32),

    /// Instances nest deeper than the traversal supports.
    #[error("instance nesting depth {depth} exceeds maximum {max}")]
    InstanceDepth {
        /// Deepest nesting found.
        depth: usize,
        /// Supported maximum.
        max: usize,
    },

    /// The hierarchy needs more stack entries than the kernel is configured with.
    #[error("hierarchy needs {required} stack entries, capacity is {capacity}")]
    StackDemand {
        /// Worst-case stack entries required.
        required: usize,
        /// Configured capacity.
        capacity: usize,
    },

    /// A packed buffer could not be decoded.
    #[error("malformed packed buffer: {0}")]
    Packed(String),
}

/// Invalid traversal configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Stack capacity outside the supported range.
    #[error("stack capacity {value} must be within 1..={max}")]
    StackCapacity {
        /// Requested capacity.
        value: usize,
        /// Largest supported capacity.
        max: usize,
    },

    /// Robust epsilon outside `(0, 0.1)`.
    #[error("robust epsilon {0} must be within (0, 0.1)")]
    RobustEpsilon(f32),

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised when creating a traversal kernel.
#[derive(Error, Debug)]
pub enum TraversalError {
    /// The scene failed validation.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for kernel construction.
pub type Result<T> = std::result::Result<T, TraversalError>;
