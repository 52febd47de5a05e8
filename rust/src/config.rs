//! Tree configuration: node capacities and behavior switches.
//!
//! Capacities are derived from the key and value sizes so that a node
//! occupies roughly [`TARGET_NODE_BYTES`], or set explicitly for tests and
//! tuning.

use std::mem::size_of;

use crate::construction::DEFAULT_CAPACITY;
use crate::error::{BPlusTreeError, InitResult};
use crate::types::{NodeRef, MIN_CAPACITY};

/// Node size the derived capacities aim for.
pub const TARGET_NODE_BYTES: usize = 256;

/// Derived capacities never go below this many slots.
pub const MIN_DERIVED_SLOTS: usize = 8;

/// Capacities are stored as `u16` in dump headers.
pub const MAX_CAPACITY: usize = u16::MAX as usize;

/// Node byte size above which in-node search switches to binary search.
pub const DEFAULT_BINARY_SEARCH_THRESHOLD: usize = 256;

/// Configuration for a [`BPlusTreeMap`](crate::BPlusTreeMap).
///
/// # Examples
///
/// ```
/// use pbtree::TreeConfig;
///
/// let config = TreeConfig::for_types::<u64, u64>();
/// assert_eq!(config.leaf_capacity, 16);
///
/// let config = TreeConfig::with_capacity(4).allow_duplicates(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Maximum entries per leaf.
    pub leaf_capacity: usize,
    /// Maximum keys per inner node (children = keys + 1).
    pub inner_capacity: usize,
    /// Accept several entries with equal keys.
    pub duplicates: bool,
    /// Node key-array size in bytes above which binary search is used.
    pub binary_search_threshold: usize,
    /// Run the full verifier after every mutation.
    pub self_verify: bool,
}

impl TreeConfig {
    /// Capacities derived from the sizes of `K` and `V`.
    pub fn for_types<K, V>() -> Self {
        let leaf_slot = (size_of::<K>() + size_of::<V>()).max(1);
        let inner_slot = (size_of::<K>() + size_of::<NodeRef>()).max(1);
        Self {
            leaf_capacity: (TARGET_NODE_BYTES / leaf_slot).clamp(MIN_DERIVED_SLOTS, MAX_CAPACITY),
            inner_capacity: (TARGET_NODE_BYTES / inner_slot).clamp(MIN_DERIVED_SLOTS, MAX_CAPACITY),
            ..Self::with_capacity(MIN_DERIVED_SLOTS)
        }
    }

    /// Same explicit capacity for leaves and inner nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            leaf_capacity: capacity,
            inner_capacity: capacity,
            duplicates: false,
            binary_search_threshold: DEFAULT_BINARY_SEARCH_THRESHOLD,
            self_verify: cfg!(feature = "testing"),
        }
    }

    pub fn leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = capacity;
        self
    }

    pub fn inner_capacity(mut self, capacity: usize) -> Self {
        self.inner_capacity = capacity;
        self
    }

    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.duplicates = allow;
        self
    }

    pub fn binary_search_threshold(mut self, bytes: usize) -> Self {
        self.binary_search_threshold = bytes;
        self
    }

    pub fn self_verify(mut self, enabled: bool) -> Self {
        self.self_verify = enabled;
        self
    }

    /// Check that both capacities are within `[MIN_CAPACITY, MAX_CAPACITY]`.
    pub fn validate(&self) -> InitResult<()> {
        for capacity in [self.leaf_capacity, self.inner_capacity] {
            if capacity < MIN_CAPACITY {
                return Err(BPlusTreeError::invalid_capacity(capacity, MIN_CAPACITY));
            }
            if capacity > MAX_CAPACITY {
                return Err(BPlusTreeError::capacity_too_large(capacity, MAX_CAPACITY));
            }
        }
        Ok(())
    }

    /// Whether searching a node of `capacity` keys of type `K` uses binary search.
    pub(crate) fn uses_binary_search<K>(&self, capacity: usize) -> bool {
        capacity * size_of::<K>() > self.binary_search_threshold
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
