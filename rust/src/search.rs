//! In-node search primitives.
//!
//! `find_lower` and `find_upper` are the only places where the tree compares
//! a search key against node keys. Every other relation is derived from `<`.

use crate::allocator::NodeAllocator;
use crate::types::BPlusTreeMap;

#[inline]
pub(crate) fn key_less<K: Ord>(a: &K, b: &K) -> bool {
    a < b
}

#[inline]
pub(crate) fn key_less_equal<K: Ord>(a: &K, b: &K) -> bool {
    !key_less(b, a)
}

#[inline]
pub(crate) fn key_greater<K: Ord>(a: &K, b: &K) -> bool {
    key_less(b, a)
}

#[inline]
pub(crate) fn key_equal<K: Ord>(a: &K, b: &K) -> bool {
    !key_less(a, b) && !key_less(b, a)
}

/// First slot whose key is `>= key`, or `keys.len()`.
#[inline]
pub fn find_lower_linear<K: Ord>(keys: &[K], key: &K) -> usize {
    let mut slot = 0;
    while slot < keys.len() && key_less(&keys[slot], key) {
        slot += 1;
    }
    slot
}

/// First slot whose key is `> key`, or `keys.len()`.
#[inline]
pub fn find_upper_linear<K: Ord>(keys: &[K], key: &K) -> usize {
    let mut slot = 0;
    while slot < keys.len() && key_less_equal(&keys[slot], key) {
        slot += 1;
    }
    slot
}

pub fn find_lower_binary<K: Ord>(keys: &[K], key: &K) -> usize {
    let slot = keys.partition_point(|k| key_less(k, key));
    debug_assert_eq!(slot, find_lower_linear(keys, key), "binary find_lower diverged");
    slot
}

pub fn find_upper_binary<K: Ord>(keys: &[K], key: &K) -> usize {
    let slot = keys.partition_point(|k| key_less_equal(k, key));
    debug_assert_eq!(slot, find_upper_linear(keys, key), "binary find_upper diverged");
    slot
}

impl<K: Ord, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// `find_lower` over a node's keys, choosing linear or binary search by
    /// the node's byte size.
    #[inline]
    pub(crate) fn find_lower(&self, keys: &[K], capacity: usize, key: &K) -> usize {
        if self.config.uses_binary_search::<K>(capacity) {
            find_lower_binary(keys, key)
        } else {
            find_lower_linear(keys, key)
        }
    }

    #[inline]
    pub(crate) fn find_upper(&self, keys: &[K], capacity: usize, key: &K) -> usize {
        if self.config.uses_binary_search::<K>(capacity) {
            find_upper_binary(keys, key)
        } else {
            find_upper_linear(keys, key)
        }
    }
}
