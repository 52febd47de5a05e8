//! Durable allocation adapter.
//!
//! The arenas own node storage. A [`NodeAllocator`] is the boundary to an
//! external persistent-memory layer: it is told the size of every node before
//! the node is placed, and then asked to commit it either durably
//! ([`NodeAllocator::activate`]) or for accounting only
//! ([`NodeAllocator::count`]). Which one is used is a per-tree mode that
//! starts out [`Persistence::Durable`] and can be switched off once.

use crate::tracing_helpers::warn_log;
use crate::types::{BPlusTreeMap, NodeRef};

/// Kind of node being allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Leaf,
    Inner,
}

/// Commit mode for newly allocated nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    /// New nodes become part of the crash-durable image.
    #[default]
    Durable,
    /// New nodes are only counted.
    Volatile,
}

/// Hooks called by the tree around node allocation.
///
/// Committing a single node is assumed atomic. A structural change that
/// touches several nodes is not, so a crash in the middle of a split or merge
/// can leave an inconsistent durable image.
///
/// Unlike a raw allocator, [`allocate`](NodeAllocator::allocate) hands back
/// no storage. Nodes always live in the tree's own arenas, so the hook only
/// learns the kind and byte size of each node. An external persistent layer
/// reserves or mirrors that many bytes on its side and is told which node
/// they belong to through `activate` or `count`.
pub trait NodeAllocator {
    /// A node of `byte_size` bytes is about to be placed in an arena.
    fn allocate(&mut self, kind: NodeKind, byte_size: usize);

    /// Commit `node` to the durable image.
    fn activate(&mut self, node: NodeRef);

    /// Track `node` for accounting without durability.
    fn count(&mut self, node: NodeRef);

    /// `node` was freed by a merge, clear or drop.
    fn release(&mut self, _node: NodeRef, _byte_size: usize) {}
}

/// Adapter for purely in-memory trees. Every hook is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolatileAllocator;

impl NodeAllocator for VolatileAllocator {
    #[inline]
    fn allocate(&mut self, _kind: NodeKind, _byte_size: usize) {}

    #[inline]
    fn activate(&mut self, _node: NodeRef) {}

    #[inline]
    fn count(&mut self, _node: NodeRef) {}
}

/// Adapter that keeps totals of what the tree asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountingAllocator {
    /// Bytes currently held by live nodes.
    pub live_bytes: usize,
    /// Bytes ever requested.
    pub allocated_bytes: usize,
    pub leaf_allocations: usize,
    pub inner_allocations: usize,
    /// Nodes committed durably.
    pub activated: usize,
    /// Nodes committed for accounting only.
    pub counted: usize,
    pub released: usize,
}

impl AccountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes allocated and not yet released.
    pub fn live_nodes(&self) -> usize {
        self.leaf_allocations + self.inner_allocations - self.released
    }
}

impl NodeAllocator for AccountingAllocator {
    fn allocate(&mut self, kind: NodeKind, byte_size: usize) {
        match kind {
            NodeKind::Leaf => self.leaf_allocations += 1,
            NodeKind::Inner => self.inner_allocations += 1,
        }
        self.allocated_bytes += byte_size;
        self.live_bytes += byte_size;
    }

    fn activate(&mut self, _node: NodeRef) {
        self.activated += 1;
    }

    fn count(&mut self, _node: NodeRef) {
        self.counted += 1;
    }

    fn release(&mut self, _node: NodeRef, byte_size: usize) {
        self.released += 1;
        self.live_bytes = self.live_bytes.saturating_sub(byte_size);
    }
}

impl<T: NodeAllocator + ?Sized> NodeAllocator for &mut T {
    fn allocate(&mut self, kind: NodeKind, byte_size: usize) {
        (**self).allocate(kind, byte_size)
    }

    fn activate(&mut self, node: NodeRef) {
        (**self).activate(node)
    }

    fn count(&mut self, node: NodeRef) {
        (**self).count(node)
    }

    fn release(&mut self, node: NodeRef, byte_size: usize) {
        (**self).release(node, byte_size)
    }
}

// ============================================================================
// TREE PERSISTENCE MODE
// ============================================================================

impl<K, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Current commit mode for new nodes.
    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    pub fn is_durable(&self) -> bool {
        self.persistence == Persistence::Durable
    }

    /// Select the commit mode for nodes allocated from now on.
    ///
    /// Switching to non-durable is permanent for this tree; a later
    /// `set_durable(true)` is ignored.
    pub fn set_durable(&mut self, durable: bool) {
        match (self.persistence, durable) {
            (Persistence::Durable, false) => self.persistence = Persistence::Volatile,
            (Persistence::Volatile, true) => {
                warn_log!("durable mode cannot be re-enabled once persistence is disabled");
            }
            _ => {}
        }
    }

    /// Equivalent to `set_durable(false)`.
    pub fn disable_persistence(&mut self) {
        self.set_durable(false);
    }

    /// The allocation adapter.
    pub fn allocator(&self) -> &A {
        &self.allocator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting_tracks_live_bytes() {
        let mut alloc = AccountingAllocator::new();
        alloc.allocate(NodeKind::Leaf, 100);
        alloc.activate(NodeRef::Leaf(0));
        alloc.allocate(NodeKind::Inner, 60);
        alloc.count(NodeRef::Inner(0));

        assert_eq!(alloc.live_bytes, 160);
        assert_eq!(alloc.activated, 1);
        assert_eq!(alloc.counted, 1);
        assert_eq!(alloc.live_nodes(), 2);

        alloc.release(NodeRef::Leaf(0), 100);
        assert_eq!(alloc.live_bytes, 60);
        assert_eq!(alloc.allocated_bytes, 160);
        assert_eq!(alloc.live_nodes(), 1);
    }

    #[test]
    fn test_default_persistence_is_durable() {
        assert_eq!(Persistence::default(), Persistence::Durable);
    }
}
