//! Compact arena storing tree nodes in a `Vec<T>` addressed by `NodeId`.
//!
//! Freed slots go on a free list and are reused by the next allocation, so
//! ids stay small and stable for the lifetime of a node. The second half of
//! this file holds the tree's node allocation helpers, which route every
//! node birth and death through the durable allocation adapter.

use std::convert::TryFrom;

use crate::allocator::{NodeAllocator, NodeKind, Persistence};
use crate::types::{BPlusTreeMap, InnerNode, LeafNode, NodeRef};

pub type NodeId = u32;
pub const NULL_NODE: NodeId = u32::MAX;

/// Arena of `T` with a free list and an allocation mask.
#[derive(Debug, Clone)]
pub struct CompactArena<T> {
    /// Slots, live or free; freed slots hold `T::default()`.
    storage: Vec<T>,
    /// Freed slots, reused last-in first-out.
    free_list: Vec<usize>,
    /// `true` for live slots.
    allocated_mask: Vec<bool>,
    /// Number of `true` entries in `allocated_mask`
    allocated: usize,
}

impl<T> CompactArena<T> {
    pub fn new() -> Self {
        Self {
            storage: Vec::new(),
            free_list: Vec::new(),
            allocated_mask: Vec::new(),
            allocated: 0,
        }
    }

    /// Arena with room for `capacity` nodes before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            allocated_mask: Vec::with_capacity(capacity),
            allocated: 0,
        }
    }

    /// Store `item`, reusing a freed slot when there is one.
    ///
    /// # Panics
    ///
    /// Panics if the arena would need more than `u32::MAX - 1` slots.
    #[inline]
    pub fn allocate(&mut self, item: T) -> NodeId {
        let index = if let Some(free_index) = self.free_list.pop() {
            self.storage[free_index] = item;
            self.allocated_mask[free_index] = true;
            free_index
        } else {
            let index = self.storage.len();
            self.storage.push(item);
            self.allocated_mask.push(true);
            index
        };
        self.allocated += 1;

        match NodeId::try_from(index) {
            Ok(id) if id != NULL_NODE => id,
            _ => panic!("arena exhausted: slot {} does not fit in a NodeId", index),
        }
    }

    /// Free the slot of `id` and hand back its node. `None` if `id` is not live.
    #[inline]
    pub fn deallocate(&mut self, id: NodeId) -> Option<T>
    where
        T: Default,
    {
        let index = self.index_of(id)?;

        self.allocated_mask[index] = false;
        self.free_list.push(index);
        self.allocated -= 1;

        Some(std::mem::take(&mut self.storage[index]))
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.index_of(id).map(|index| &self.storage[index])
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.index_of(id).map(move |index| &mut self.storage[index])
    }

    /// Whether `id` names a live slot.
    pub fn contains(&self, id: NodeId) -> bool {
        self.index_of(id).is_some()
    }

    #[inline]
    fn index_of(&self, id: NodeId) -> Option<usize> {
        if id == NULL_NODE {
            return None;
        }
        let index = usize::try_from(id).ok()?;
        if self.allocated_mask.get(index).copied().unwrap_or(false) {
            Some(index)
        } else {
            None
        }
    }

    /// Live nodes.
    pub fn len(&self) -> usize {
        self.allocated
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// Drop every node. Ids handed out before are invalid afterwards.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.allocated_mask.clear();
        self.free_list.clear();
        self.allocated = 0;
    }
}

impl<T> Default for CompactArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BPLUSTREE NODE ALLOCATION HELPERS
// ============================================================================

#[cold]
#[inline(never)]
fn missing_node(kind: &str, id: NodeId) -> ! {
    panic!("corrupted tree: {} node {} is not allocated", kind, id)
}

impl<K, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Place a new leaf in the arena and commit it through the adapter.
    pub(crate) fn allocate_leaf(&mut self) -> NodeId {
        let capacity = self.config.leaf_capacity;
        self.allocator
            .allocate(NodeKind::Leaf, LeafNode::<K, V>::byte_size(capacity));
        let id = self.leaf_arena.allocate(LeafNode::new(capacity));
        self.commit_node(NodeRef::Leaf(id));
        self.stats.leaves += 1;
        id
    }

    /// Place a new inner node of the given level and commit it.
    pub(crate) fn allocate_inner(&mut self, level: u16) -> NodeId {
        let capacity = self.config.inner_capacity;
        self.allocator
            .allocate(NodeKind::Inner, InnerNode::<K>::byte_size(capacity));
        let id = self.inner_arena.allocate(InnerNode::new(capacity, level));
        self.commit_node(NodeRef::Inner(id));
        self.stats.inner_nodes += 1;
        id
    }

    fn commit_node(&mut self, node: NodeRef) {
        match self.persistence {
            Persistence::Durable => self.allocator.activate(node),
            Persistence::Volatile => self.allocator.count(node),
        }
    }

    /// Return a leaf to the arena and tell the adapter.
    pub(crate) fn free_leaf(&mut self, id: NodeId) -> LeafNode<K, V> {
        let leaf = match self.leaf_arena.deallocate(id) {
            Some(leaf) => leaf,
            None => missing_node("leaf", id),
        };
        self.allocator
            .release(NodeRef::Leaf(id), LeafNode::<K, V>::byte_size(leaf.capacity));
        self.stats.leaves -= 1;
        leaf
    }

    /// Return an inner node to the arena and tell the adapter.
    pub(crate) fn free_inner(&mut self, id: NodeId) -> InnerNode<K> {
        let inner = match self.inner_arena.deallocate(id) {
            Some(inner) => inner,
            None => missing_node("inner", id),
        };
        self.allocator
            .release(NodeRef::Inner(id), InnerNode::<K>::byte_size(inner.capacity));
        self.stats.inner_nodes -= 1;
        inner
    }

    // ============================================================================
    // CHECKED NODE ACCESS
    // ============================================================================

    #[inline]
    pub(crate) fn leaf(&self, id: NodeId) -> &LeafNode<K, V> {
        match self.leaf_arena.get(id) {
            Some(leaf) => leaf,
            None => missing_node("leaf", id),
        }
    }

    #[inline]
    pub(crate) fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode<K, V> {
        match self.leaf_arena.get_mut(id) {
            Some(leaf) => leaf,
            None => missing_node("leaf", id),
        }
    }

    #[inline]
    pub(crate) fn inner(&self, id: NodeId) -> &InnerNode<K> {
        match self.inner_arena.get(id) {
            Some(inner) => inner,
            None => missing_node("inner", id),
        }
    }

    #[inline]
    pub(crate) fn inner_mut(&mut self, id: NodeId) -> &mut InnerNode<K> {
        match self.inner_arena.get_mut(id) {
            Some(inner) => inner,
            None => missing_node("inner", id),
        }
    }

    /// Get a leaf node by id, if it is allocated.
    pub fn get_leaf(&self, id: NodeId) -> Option<&LeafNode<K, V>> {
        self.leaf_arena.get(id)
    }

    /// Get an inner node by id, if it is allocated.
    pub fn get_inner(&self, id: NodeId) -> Option<&InnerNode<K>> {
        self.inner_arena.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_arena_basic_operations() {
        let mut arena = CompactArena::new();

        let id1 = arena.allocate(42);
        let id2 = arena.allocate(84);
        let id3 = arena.allocate(126);

        assert_eq!(arena.get(id1), Some(&42));
        assert_eq!(arena.get(id2), Some(&84));
        assert_eq!(arena.get(id3), Some(&126));

        assert!(arena.contains(id1));
        assert!(!arena.contains(NULL_NODE));

        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let mut arena: CompactArena<i32> = CompactArena::new();

        let id1 = arena.allocate(42);
        let id2 = arena.allocate(84);

        assert_eq!(arena.deallocate(id1), Some(42));
        assert_eq!(arena.deallocate(id1), None);
        assert!(!arena.contains(id1));
        assert!(arena.contains(id2));
        assert_eq!(arena.len(), 1);

        let id3 = arena.allocate(168);
        assert_eq!(id3, id1);
        assert_eq!(arena.get(id3), Some(&168));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut arena = CompactArena::with_capacity(4);
        let id = arena.allocate("a");
        arena.allocate("b");
        arena.clear();
        assert!(arena.is_empty());
        assert!(arena.get(id).is_none());
        assert_eq!(arena.allocate("c"), 0);
    }
}
