//! Fixed-capacity traversal stack and instance frames.

use crate::node::NodeRef;
use crate::node_test::SlabRay;

/// Largest supported traversal stack.
pub const STACK_CAPACITY: usize = 192;

/// Deepest supported instance nesting.
pub const MAX_INSTANCE_DEPTH: usize = 8;

/// A deferred piece of work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StackEntry {
    /// Visit `node` later; `tnear` is its entry distance when it was pushed.
    Node {
        /// Deferred child.
        node: NodeRef,
        /// Entry distance along the ray.
        tnear: f32,
    },
    /// Leave the current instance and restore the enclosing ray.
    InstanceReturn,
}

/// Node stack living on the call stack.
///
/// `capacity` is the configured limit; the backing array always holds
/// [`STACK_CAPACITY`] entries.
pub(crate) struct TraversalStack {
    entries: [StackEntry; STACK_CAPACITY],
    len: usize,
    capacity: usize,
}

impl TraversalStack {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: [StackEntry::InstanceReturn; STACK_CAPACITY],
            len: 0,
            capacity: capacity.min(STACK_CAPACITY),
        }
    }

    /// # Panics
    ///
    /// Panics when the backing array is full. Kernel creation rejects scenes
    /// whose demand exceeds the configured capacity, so this indicates a bug.
    #[inline]
    pub(crate) fn push(&mut self, entry: StackEntry) {
        debug_assert!(self.len < self.capacity, "traversal stack overflow");
        self.entries[self.len] = entry;
        self.len += 1;
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<StackEntry> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.entries[self.len])
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

/// Saved state of the enclosing space while inside an instance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InstanceFrame {
    pub(crate) ray: SlabRay,
    pub(crate) object: Option<u32>,
}

/// Instance frames, one per nesting level.
pub(crate) struct InstanceStack {
    frames: [Option<InstanceFrame>; MAX_INSTANCE_DEPTH],
    depth: usize,
}

impl InstanceStack {
    pub(crate) fn new() -> Self {
        Self {
            frames: [None; MAX_INSTANCE_DEPTH],
            depth: 0,
        }
    }

    /// # Panics
    ///
    /// Panics past [`MAX_INSTANCE_DEPTH`]; scene validation rejects deeper nesting.
    #[inline]
    pub(crate) fn push(&mut self, frame: InstanceFrame) {
        self.frames[self.depth] = Some(frame);
        self.depth += 1;
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<InstanceFrame> {
        if self.depth == 0 {
            return None;
        }
        self.depth -= 1;
        self.frames[self.depth].take()
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}
