//! Arena-backed B+ tree index core.
//!
//! This crate provides a B+ tree with a dictionary-like interface and a
//! position-based query surface: `lower_bound`, `upper_bound`,
//! `equal_range`, forward and reverse positions, and iterators that walk the
//! leaf chain. Trees can be built incrementally or bulk loaded from sorted
//! input, may allow duplicate keys, report every node they allocate to a
//! [`NodeAllocator`], and can be dumped to and restored from a compact
//! binary image.
//!
//! # Examples
//!
//! ```
//! use pbtree::BPlusTreeMap;
//!
//! let mut tree = BPlusTreeMap::new(4).unwrap();
//! tree.insert(3, "three");
//! tree.insert(1, "one");
//! tree.insert(2, "two");
//!
//! assert_eq!(tree.get(&2), Some(&"two"));
//! assert_eq!(tree.keys().copied().collect::<Vec<_>>(), [1, 2, 3]);
//!
//! let position = tree.lower_bound(&2);
//! assert_eq!(tree.entry_at(position), Some((&2, &"two")));
//! ```

mod tracing_helpers;

mod allocator;
mod bulk_load;
mod compact_arena;
mod config;
mod construction;
mod delete_operations;
mod error;
mod get_operations;
mod insert_operations;
mod iteration;
mod node;
mod range_queries;
mod search;
mod serialization;
mod tree_structure;
mod types;
mod validation;

pub use allocator::{AccountingAllocator, NodeAllocator, NodeKind, Persistence, VolatileAllocator};
pub use compact_arena::CompactArena;
pub use config::{
    TreeConfig, DEFAULT_BINARY_SEARCH_THRESHOLD, MAX_CAPACITY, MIN_DERIVED_SLOTS, TARGET_NODE_BYTES,
};
pub use construction::DEFAULT_CAPACITY;
pub use error::{BPlusTreeError, BTreeResult, InitResult, KeyResult, ModifyResult};
pub use iteration::{ItemIterator, KeyIterator, Position, ReversePosition, ValueIterator};
pub use search::{find_lower_binary, find_lower_linear, find_upper_binary, find_upper_linear};
pub use serialization::{DumpHeader, NodeHeader, DUMP_SIGNATURE, DUMP_VERSION, MAX_RESTORE_HEIGHT};
pub use types::{
    BPlusTreeMap, BPlusTreeSet, InnerNode, LeafNode, NodeId, NodeRef, TreeStats, MIN_CAPACITY, NULL_NODE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_set_share_one_core() {
        let mut set: BPlusTreeSet<u32> = BPlusTreeSet::new(4).unwrap();
        for key in [5, 1, 9, 3, 7] {
            assert!(set.insert_key(key).1);
        }
        assert!(!set.insert_key(5).1);
        assert_eq!(set.keys().copied().collect::<Vec<_>>(), [1, 3, 5, 7, 9]);

        let mut map = BPlusTreeMap::new(4).unwrap();
        map.extend(set.keys().map(|&k| (k, k * 2)));
        assert_eq!(map.get(&7), Some(&14));
        map.verify();
    }

    #[test]
    fn test_mixed_workload_keeps_invariants() {
        let mut tree = BPlusTreeMap::with_config(TreeConfig::with_capacity(4).self_verify(true)).unwrap();
        for i in 0..200u32 {
            tree.insert((i * 37) % 211, i);
            if i % 3 == 0 {
                tree.erase_by_key(&((i * 11) % 211));
            }
        }
        let keys: Vec<_> = tree.keys().copied().collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(keys.len(), tree.len());
    }

    #[test]
    fn test_public_capacity_constants() {
        assert!(BPlusTreeMap::<u8, u8>::new(MIN_CAPACITY - 1).is_err());
        assert!(BPlusTreeMap::<u8, u8>::new(MIN_CAPACITY).is_ok());
        assert_eq!(TreeConfig::default().leaf_capacity, DEFAULT_CAPACITY);
        assert!(BPlusTreeMap::<u64, u64>::with_config(TreeConfig::default()).is_ok());
    }
}
