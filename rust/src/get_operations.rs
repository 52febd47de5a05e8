//! GET operations for BPlusTreeMap.
//!
//! This module contains all the read operations for the B+ tree: bound
//! searches that descend to a leaf position, and the key lookups built on
//! top of them.

use crate::allocator::NodeAllocator;
use crate::error::{BPlusTreeError, KeyResult};
use crate::iteration::Position;
use crate::search::key_equal;
use crate::types::{BPlusTreeMap, NodeRef, NULL_NODE};

impl<K: Ord, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    // ============================================================================
    // BOUND SEARCHES
    // ============================================================================

    /// Position of the first entry whose key is `>= key`, or `end()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(4).unwrap();
    /// for key in [10, 20, 30] {
    ///     tree.insert(key, ());
    /// }
    /// assert_eq!(tree.key_at(tree.lower_bound(&20)), Some(&20));
    /// assert_eq!(tree.key_at(tree.lower_bound(&25)), Some(&30));
    /// assert_eq!(tree.lower_bound(&35), tree.end());
    /// ```
    pub fn lower_bound(&self, key: &K) -> Position {
        self.bound_position(key, false)
    }

    /// Position of the first entry whose key is `> key`, or `end()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(4).unwrap();
    /// for key in [10, 20, 30] {
    ///     tree.insert(key, ());
    /// }
    /// assert_eq!(tree.key_at(tree.upper_bound(&20)), Some(&30));
    /// assert_eq!(tree.upper_bound(&30), tree.end());
    /// ```
    pub fn upper_bound(&self, key: &K) -> Position {
        self.bound_position(key, true)
    }

    /// `(lower_bound(key), upper_bound(key))`.
    pub fn equal_range(&self, key: &K) -> (Position, Position) {
        (self.lower_bound(key), self.upper_bound(key))
    }

    fn bound_position(&self, key: &K, upper: bool) -> Position {
        let Some(mut node) = self.root else {
            return self.end();
        };

        loop {
            match node {
                NodeRef::Inner(id) => {
                    let inner = self.inner(id);
                    let slot = if upper {
                        self.find_upper(&inner.keys, inner.capacity, key)
                    } else {
                        self.find_lower(&inner.keys, inner.capacity, key)
                    };
                    node = inner.children[slot];
                }
                NodeRef::Leaf(id) => {
                    let leaf = self.leaf(id);
                    let slot = if upper {
                        self.find_upper(&leaf.keys, leaf.capacity, key)
                    } else {
                        self.find_lower(&leaf.keys, leaf.capacity, key)
                    };
                    if slot == leaf.len() && leaf.next != NULL_NODE {
                        return Position::new(leaf.next, 0);
                    }
                    return Position::new(id, slot);
                }
            }
        }
    }

    // ============================================================================
    // PUBLIC GET OPERATIONS
    // ============================================================================

    /// Position of the first entry equal to `key`.
    pub fn find(&self, key: &K) -> Option<Position> {
        let position = self.lower_bound(key);
        self.key_at(position)
            .filter(|found| key_equal(*found, key))
            .map(|_| position)
    }

    /// Check if key exists in the tree.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(16).unwrap();
    /// tree.insert(1, "one");
    /// assert!(tree.exists(&1));
    /// assert!(!tree.exists(&2));
    /// ```
    pub fn exists(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Alias for [`exists`](Self::exists).
    pub fn contains_key(&self, key: &K) -> bool {
        self.exists(key)
    }

    /// Get a reference to the value of the first entry equal to `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(16).unwrap();
    /// tree.insert(1, "one");
    /// assert_eq!(tree.get(&1), Some(&"one"));
    /// assert_eq!(tree.get(&2), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        self.value_at(self.find(key)?)
    }

    /// Get a mutable reference to the value of the first entry equal to `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let position = self.find(key)?;
        self.value_at_mut(position)
    }

    /// Get value for a key, returning an error if the key doesn't exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(16).unwrap();
    /// tree.insert(1, "one");
    /// assert_eq!(tree.at(&1).unwrap(), &"one");
    /// assert!(tree.at(&2).is_err());
    /// ```
    pub fn at(&self, key: &K) -> KeyResult<&V> {
        self.get(key).ok_or(BPlusTreeError::KeyNotFound)
    }

    /// Replace the value of the first entry equal to `key`.
    ///
    /// # Returns
    ///
    /// The previous value, or `KeyNotFound` with the tree unchanged.
    pub fn update(&mut self, key: &K, value: V) -> KeyResult<V> {
        match self.get_mut(key) {
            Some(slot) => Ok(std::mem::replace(slot, value)),
            None => Err(BPlusTreeError::KeyNotFound),
        }
    }

    /// Number of entries equal to `key`.
    pub fn count(&self, key: &K) -> usize {
        self.iter_from(self.lower_bound(key))
            .take_while(|(found, _)| key_equal(*found, key))
            .count()
    }

    /// Returns the first key-value pair in the tree.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.items().next()
    }

    /// Returns the last key-value pair in the tree.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.items().next_back()
    }
}
