//! Node record implementations for BPlusTreeMap.
//!
//! Nodes only answer questions about themselves: occupancy predicates and
//! raw slot access. Every structural change (split, merge, shift) is done by
//! the insertion, deletion and bulk loading engines.

use std::mem::size_of;

use crate::types::{InnerNode, LeafNode, NodeId, NodeRef, NULL_NODE};

// ============================================================================
// LEAF NODE IMPLEMENTATION
// ============================================================================

impl<K, V> LeafNode<K, V> {
    /// Creates an empty, unlinked leaf with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            prev: NULL_NODE,
            next: NULL_NODE,
        }
    }

    /// Size in bytes of a leaf record with `capacity` slots.
    pub fn byte_size(capacity: usize) -> usize {
        2 * size_of::<u16>()
            + 2 * size_of::<NodeId>()
            + capacity * (size_of::<K>() + size_of::<V>())
    }

    /// Leaves are always level 0.
    pub fn level(&self) -> u16 {
        0
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Smallest occupancy a non-root leaf may keep.
    pub fn min_keys(&self) -> usize {
        self.capacity / 2
    }

    /// No free slot left.
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    /// At or below minimum occupancy: cannot give away an entry.
    pub fn is_few(&self) -> bool {
        self.keys.len() <= self.min_keys()
    }

    /// Below minimum occupancy.
    pub fn is_underflow(&self) -> bool {
        self.keys.len() < self.min_keys()
    }

    /// Get a reference to the keys in this leaf node.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Get a reference to the values in this leaf node.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn first_key(&self) -> Option<&K> {
        self.keys.first()
    }

    pub fn last_key(&self) -> Option<&K> {
        self.keys.last()
    }

    /// Previous leaf in the chain, if any.
    pub fn prev_leaf(&self) -> Option<NodeId> {
        (self.prev != NULL_NODE).then_some(self.prev)
    }

    /// Next leaf in the chain, if any.
    pub fn next_leaf(&self) -> Option<NodeId> {
        (self.next != NULL_NODE).then_some(self.next)
    }
}

impl<K, V> Default for LeafNode<K, V> {
    fn default() -> Self {
        Self {
            capacity: 0,
            keys: Vec::new(),
            values: Vec::new(),
            prev: NULL_NODE,
            next: NULL_NODE,
        }
    }
}

// ============================================================================
// INNER NODE IMPLEMENTATION
// ============================================================================

impl<K> InnerNode<K> {
    /// Creates an empty inner node at `level` (1 = parent of leaves).
    pub fn new(capacity: usize, level: u16) -> Self {
        Self {
            capacity,
            level,
            keys: Vec::with_capacity(capacity),
            children: Vec::with_capacity(capacity + 1),
        }
    }

    /// Size in bytes of an inner record with `capacity` key slots.
    pub fn byte_size(capacity: usize) -> usize {
        2 * size_of::<u16>() + capacity * size_of::<K>() + (capacity + 1) * size_of::<NodeId>()
    }

    pub fn level(&self) -> u16 {
        self.level
    }

    /// Returns the number of occupied key slots.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn min_keys(&self) -> usize {
        self.capacity / 2
    }

    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    pub fn is_few(&self) -> bool {
        self.keys.len() <= self.min_keys()
    }

    pub fn is_underflow(&self) -> bool {
        self.keys.len() < self.min_keys()
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    /// Whether the children of this node are leaves.
    pub fn has_leaf_children(&self) -> bool {
        self.level == 1
    }

    pub fn first_child(&self) -> Option<NodeRef> {
        self.children.first().copied()
    }

    pub fn last_child(&self) -> Option<NodeRef> {
        self.children.last().copied()
    }
}

impl<K> Default for InnerNode<K> {
    fn default() -> Self {
        Self {
            capacity: 0,
            level: 1,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }
}
