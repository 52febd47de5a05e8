//! Construction, deep copy and comparison for BPlusTreeMap.
//!
//! This module contains the constructors, capacity validation, the `Clone`
//! deep copy that re-allocates every node through the adapter, and the
//! standard trait implementations that treat a tree as an ordered sequence
//! of entries.

use std::cmp::Ordering;

use crate::allocator::{NodeAllocator, Persistence, VolatileAllocator};
use crate::compact_arena::CompactArena;
use crate::config::TreeConfig;
use crate::error::InitResult;
use crate::types::{BPlusTreeMap, NodeId, NodeRef, TreeStats, NULL_NODE};

/// Default capacity for B+ tree nodes when capacities are not derived
pub const DEFAULT_CAPACITY: usize = 16;

impl<K, V> BPlusTreeMap<K, V> {
    /// Create a B+ tree with the same node capacity for leaves and inner nodes.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of keys per node (minimum 4)
    ///
    /// # Returns
    ///
    /// Returns `Ok(BPlusTreeMap)` if capacity is valid, `Err(BPlusTreeError)` otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let tree = BPlusTreeMap::<i32, String>::new(16).unwrap();
    /// assert!(tree.is_empty());
    /// assert!(BPlusTreeMap::<i32, String>::new(2).is_err());
    /// ```
    pub fn new(capacity: usize) -> InitResult<Self> {
        Self::with_config(TreeConfig::with_capacity(capacity))
    }

    /// Create a B+ tree whose capacities are derived from the key and value sizes.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let tree = BPlusTreeMap::<u64, u64>::with_default_capacity();
    /// assert_eq!(tree.config().leaf_capacity, 16);
    /// ```
    pub fn with_default_capacity() -> Self {
        Self::from_parts(TreeConfig::for_types::<K, V>(), VolatileAllocator)
    }

    /// Create a B+ tree from an explicit configuration.
    pub fn with_config(config: TreeConfig) -> InitResult<Self> {
        Self::with_config_and_allocator(config, VolatileAllocator)
    }

    /// Create a B+ tree that keeps every entry, including equal keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::multimap(8).unwrap();
    /// tree.insert(1, "a");
    /// tree.insert(1, "b");
    /// assert_eq!(tree.count(&1), 2);
    /// ```
    pub fn multimap(capacity: usize) -> InitResult<Self> {
        Self::with_config(TreeConfig::with_capacity(capacity).allow_duplicates(true))
    }
}

impl<K, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Create a B+ tree that reports node allocations to `allocator`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::{AccountingAllocator, BPlusTreeMap, TreeConfig};
    ///
    /// let mut tree = BPlusTreeMap::with_config_and_allocator(
    ///     TreeConfig::with_capacity(4),
    ///     AccountingAllocator::new(),
    /// )
    /// .unwrap();
    /// tree.insert(1u32, 1u32);
    /// assert_eq!(tree.allocator().activated, 1);
    /// ```
    pub fn with_config_and_allocator(config: TreeConfig, allocator: A) -> InitResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, allocator))
    }

    fn from_parts(config: TreeConfig, allocator: A) -> Self {
        Self {
            config,
            root: None,
            head_leaf: NULL_NODE,
            tail_leaf: NULL_NODE,
            stats: TreeStats::default(),
            leaf_arena: CompactArena::new(),
            inner_arena: CompactArena::new(),
            allocator,
            persistence: Persistence::default(),
        }
    }

    /// The configuration this tree was built with.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Whether equal keys may be stored more than once.
    pub fn allows_duplicates(&self) -> bool {
        self.config.duplicates
    }
}

impl<K, V> Default for BPlusTreeMap<K, V> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl<K, V, A: NodeAllocator> Drop for BPlusTreeMap<K, V, A> {
    fn drop(&mut self) {
        self.release_all_nodes();
    }
}

// ============================================================================
// DEEP COPY
// ============================================================================

impl<K: Clone, V: Clone, A: NodeAllocator + Clone> Clone for BPlusTreeMap<K, V, A> {
    fn clone(&self) -> Self {
        let mut copy = Self::from_parts(self.config, self.allocator.clone());
        copy.persistence = self.persistence;

        if let Some(root) = self.root {
            let mut last_leaf = NULL_NODE;
            let new_root = copy.copy_subtree(self, root, &mut last_leaf);
            copy.root = Some(new_root);
            copy.tail_leaf = last_leaf;
        }
        copy.stats.item_count = self.stats.item_count;
        copy
    }
}

impl<K: Clone, V: Clone, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Pre-order copy of `node` from `source`, relinking leaves as they are
    /// created.
    fn copy_subtree(&mut self, source: &Self, node: NodeRef, last_leaf: &mut NodeId) -> NodeRef {
        match node {
            NodeRef::Leaf(id) => {
                let src = source.leaf(id);
                let new_id = self.allocate_leaf();
                let leaf = self.leaf_mut(new_id);
                leaf.keys.extend(src.keys.iter().cloned());
                leaf.values.extend(src.values.iter().cloned());
                leaf.prev = *last_leaf;

                if *last_leaf == NULL_NODE {
                    self.head_leaf = new_id;
                } else {
                    self.leaf_mut(*last_leaf).next = new_id;
                }
                *last_leaf = new_id;
                NodeRef::Leaf(new_id)
            }
            NodeRef::Inner(id) => {
                let src = source.inner(id);
                let new_id = self.allocate_inner(src.level);
                self.inner_mut(new_id).keys.extend(src.keys.iter().cloned());

                let children: Vec<NodeRef> = src
                    .children
                    .iter()
                    .map(|&child| self.copy_subtree(source, child, last_leaf))
                    .collect();
                self.inner_mut(new_id).children.extend(children);
                NodeRef::Inner(new_id)
            }
        }
    }
}

// ============================================================================
// COMPARISON AND COLLECTION TRAITS
// ============================================================================

impl<K: PartialEq, V: PartialEq, A: NodeAllocator> PartialEq for BPlusTreeMap<K, V, A> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.items().eq(other.items())
    }
}

impl<K: Eq, V: Eq, A: NodeAllocator> Eq for BPlusTreeMap<K, V, A> {}

impl<K: PartialOrd, V: PartialOrd, A: NodeAllocator> PartialOrd for BPlusTreeMap<K, V, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.items().partial_cmp(other.items())
    }
}

impl<K: Ord, V: Ord, A: NodeAllocator> Ord for BPlusTreeMap<K, V, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.items().cmp(other.items())
    }
}

impl<K: Ord + Clone, V, A: NodeAllocator> Extend<(K, V)> for BPlusTreeMap<K, V, A> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.insert_range(iter);
    }
}

impl<K: Ord + Clone, V> FromIterator<(K, V)> for BPlusTreeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = Self::with_default_capacity();
        tree.insert_range(iter);
        tree
    }
}
