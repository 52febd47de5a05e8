//! Core types and data structures for BPlusTreeMap.
//!
//! This module contains the tree handle, the two node records and the small
//! value types passed between the insertion and deletion engines.

use crate::allocator::{NodeAllocator, Persistence, VolatileAllocator};
use crate::compact_arena::CompactArena;
use crate::config::TreeConfig;

pub use crate::compact_arena::{NodeId, NULL_NODE};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Minimum capacity for any B+ tree node
pub const MIN_CAPACITY: usize = 4;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// B+ tree mapping ordered keys to values.
///
/// Nodes live in two arenas and reference each other by [`NodeId`]. Inner
/// nodes store the *maximum* key of each child subtree as its separator, and
/// all leaves form a doubly-linked chain in key order.
///
/// # Type Parameters
///
/// * `K` - Key type, ordered by `Ord`
/// * `V` - Value type; use `()` for an ordered set
/// * `A` - Durable allocation adapter consulted for every node
///
/// # Examples
///
/// ```
/// use pbtree::BPlusTreeMap;
///
/// let mut tree = BPlusTreeMap::new(16).unwrap();
/// tree.insert(1, "one");
/// tree.insert(2, "two");
/// tree.insert(3, "three");
///
/// assert_eq!(tree.get(&2), Some(&"two"));
/// assert_eq!(tree.len(), 3);
///
/// let range: Vec<_> = tree.range(1..3).collect();
/// assert_eq!(range, [(&1, &"one"), (&2, &"two")]);
/// ```
///
/// # Performance Characteristics
///
/// - **Insertion**: O(log n)
/// - **Lookup**: O(log n)
/// - **Deletion**: O(log n)
/// - **Range queries**: O(log n + k) where k is the number of items in range
/// - **Bulk load**: O(n)
#[derive(Debug)]
pub struct BPlusTreeMap<K, V, A: NodeAllocator = VolatileAllocator> {
    /// Node capacities and behavior switches.
    pub(crate) config: TreeConfig,
    /// Swappable root slot; `None` for the empty tree.
    pub(crate) root: Option<NodeRef>,
    /// First leaf of the leaf chain.
    pub(crate) head_leaf: NodeId,
    /// Last leaf of the leaf chain.
    pub(crate) tail_leaf: NodeId,
    /// Item and node counters.
    pub(crate) stats: TreeStats,
    /// Arena storage for leaf nodes.
    pub(crate) leaf_arena: CompactArena<LeafNode<K, V>>,
    /// Arena storage for inner nodes.
    pub(crate) inner_arena: CompactArena<InnerNode<K>>,
    /// Adapter told about every node allocation and release.
    pub(crate) allocator: A,
    /// Commit mode for newly allocated nodes.
    pub(crate) persistence: Persistence,
}

/// Ordered set backed by a B+ tree with unit values.
pub type BPlusTreeSet<K, A = VolatileAllocator> = BPlusTreeMap<K, (), A>;

/// Leaf node containing key-value pairs.
#[derive(Debug, Clone)]
pub struct LeafNode<K, V> {
    /// Maximum number of keys this node can hold.
    pub(crate) capacity: usize,
    /// Sorted list of keys.
    pub(crate) keys: Vec<K>,
    /// List of values corresponding to keys.
    pub(crate) values: Vec<V>,
    /// Previous leaf in the chain.
    pub(crate) prev: NodeId,
    /// Next leaf in the chain.
    pub(crate) next: NodeId,
}

/// Inner node containing separator keys and child references.
#[derive(Debug, Clone)]
pub struct InnerNode<K> {
    /// Maximum number of keys this node can hold.
    pub(crate) capacity: usize,
    /// Height above the leaves; always at least 1.
    pub(crate) level: u16,
    /// `keys[i]` is the largest key in `children[i]`.
    pub(crate) keys: Vec<K>,
    /// One more child than keys.
    pub(crate) children: Vec<NodeRef>,
}

// ============================================================================
// ENUMS AND RESULT TYPES
// ============================================================================

/// Reference to a node in one of the two arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Leaf(NodeId),
    Inner(NodeId),
}

impl NodeRef {
    /// Return the raw node ID.
    pub fn id(&self) -> NodeId {
        match *self {
            NodeRef::Leaf(id) => id,
            NodeRef::Inner(id) => id,
        }
    }

    /// Returns true if this reference points to a leaf node.
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeRef::Leaf(_))
    }
}

/// Aggregate counters maintained on every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of key/value entries.
    pub item_count: usize,
    /// Number of leaf nodes.
    pub leaves: usize,
    /// Number of inner nodes.
    pub inner_nodes: usize,
}

impl TreeStats {
    /// Total node count.
    pub fn nodes(&self) -> usize {
        self.leaves + self.inner_nodes
    }

    /// Average leaf occupancy as a fraction of `leaf_capacity`.
    pub fn avg_fill_leaves(&self, leaf_capacity: usize) -> f64 {
        if self.leaves == 0 || leaf_capacity == 0 {
            return 0.0;
        }
        self.item_count as f64 / (self.leaves * leaf_capacity) as f64
    }
}

/// New right sibling produced by a split, with the key that separates it
/// from the node it was split from.
#[derive(Debug)]
pub(crate) struct Split<K> {
    pub(crate) separator: K,
    pub(crate) node: NodeRef,
}
