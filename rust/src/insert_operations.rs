//! INSERT operations for BPlusTreeMap.
//!
//! Insertion descends from the root to the leaf chosen by `find_lower`,
//! splitting full nodes on the way back up. A split hands its parent the new
//! right sibling together with the maximum key left behind in the original
//! node. A root split grows the tree by one level.

use crate::allocator::NodeAllocator;
use crate::error::{BPlusTreeError, ModifyResult};
use crate::iteration::Position;
use crate::search::key_equal;
use crate::tracing_helpers::trace_log;
use crate::types::{BPlusTreeMap, NodeId, NodeRef, Split, NULL_NODE};

/// Result of inserting into one subtree.
struct InsertStep<K> {
    position: Position,
    inserted: bool,
    split: Option<Split<K>>,
}

impl<K: Ord + Clone, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    // ============================================================================
    // PUBLIC INSERT OPERATIONS
    // ============================================================================

    /// Insert a key-value pair.
    ///
    /// # Returns
    ///
    /// The position of the entry and whether it was inserted. When the tree
    /// rejects duplicates and `key` is already present, nothing changes and
    /// the position of the existing entry is returned with `false`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(4).unwrap();
    /// let (pos, inserted) = tree.insert(10, "ten");
    /// assert!(inserted);
    /// assert_eq!(tree.key_at(pos), Some(&10));
    ///
    /// let (again, inserted) = tree.insert(10, "TEN");
    /// assert!(!inserted);
    /// assert_eq!(again, pos);
    /// assert_eq!(tree.get(&10), Some(&"ten"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> (Position, bool) {
        let root = match self.root {
            Some(root) => root,
            None => {
                let id = self.allocate_leaf();
                self.head_leaf = id;
                self.tail_leaf = id;
                self.root = Some(NodeRef::Leaf(id));
                NodeRef::Leaf(id)
            }
        };

        let step = self.insert_descend(root, key, value);
        if let Some(split) = step.split {
            self.grow_root(root, split);
        }
        if step.inserted {
            self.stats.item_count += 1;
            self.verify_if_enabled("insert");
        }
        (step.position, step.inserted)
    }

    /// Insert a key-value pair, failing if a duplicate is rejected.
    pub fn try_insert(&mut self, key: K, value: V) -> ModifyResult<Position> {
        match self.insert(key, value) {
            (position, true) => Ok(position),
            (_, false) => Err(BPlusTreeError::DuplicateKey),
        }
    }

    /// Insert every pair from `items` in order.
    ///
    /// # Returns
    ///
    /// The number of pairs actually inserted.
    pub fn insert_range<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        items
            .into_iter()
            .map(|(key, value)| self.insert(key, value).1)
            .filter(|&inserted| inserted)
            .count()
    }

    // ============================================================================
    // RECURSIVE DESCENT
    // ============================================================================

    fn insert_descend(&mut self, node: NodeRef, key: K, value: V) -> InsertStep<K> {
        match node {
            NodeRef::Leaf(id) => self.insert_into_leaf(id, key, value),
            NodeRef::Inner(id) => self.insert_into_inner(id, key, value),
        }
    }

    fn insert_into_leaf(&mut self, leaf_id: NodeId, key: K, value: V) -> InsertStep<K> {
        let leaf = self.leaf(leaf_id);
        let mut slot = self.find_lower(&leaf.keys, leaf.capacity, &key);

        if !self.config.duplicates && slot < leaf.len() && key_equal(&leaf.keys[slot], &key) {
            return InsertStep {
                position: Position::new(leaf_id, slot),
                inserted: false,
                split: None,
            };
        }

        let mut target = leaf_id;
        let mut split = None;
        if leaf.is_full() {
            let (separator, right_id) = self.split_leaf(leaf_id);
            let left_len = self.leaf(leaf_id).len();
            if slot >= left_len {
                slot -= left_len;
                target = right_id;
            }
            split = Some(Split {
                separator,
                node: NodeRef::Leaf(right_id),
            });
        }

        let leaf = self.leaf_mut(target);
        leaf.keys.insert(slot, key);
        leaf.values.insert(slot, value);

        InsertStep {
            position: Position::new(target, slot),
            inserted: true,
            split,
        }
    }

    fn insert_into_inner(&mut self, inner_id: NodeId, key: K, value: V) -> InsertStep<K> {
        let inner = self.inner(inner_id);
        let mut slot = self.find_lower(&inner.keys, inner.capacity, &key);
        let child = inner.children[slot];

        let mut step = self.insert_descend(child, key, value);
        let Some(Split {
            separator: new_key,
            node: new_child,
        }) = step.split.take()
        else {
            return step;
        };

        let mut target = inner_id;
        if self.inner(inner_id).is_full() {
            let (up_key, right_id) = self.split_inner(inner_id, slot);
            let left_len = self.inner(inner_id).len();
            let right_len = self.inner(right_id).len();

            if slot == left_len + 1 && left_len < right_len {
                // The split child sits at the boundary: its lower half moves to
                // the end of the left node and the new child opens the right one.
                let moved = std::mem::replace(&mut self.inner_mut(right_id).children[0], new_child);
                let left = self.inner_mut(inner_id);
                left.keys.push(up_key);
                left.children.push(moved);
                step.split = Some(Split {
                    separator: new_key,
                    node: NodeRef::Inner(right_id),
                });
                return step;
            }

            if slot >= left_len + 1 {
                slot -= left_len + 1;
                target = right_id;
            }
            step.split = Some(Split {
                separator: up_key,
                node: NodeRef::Inner(right_id),
            });
        }

        let inner = self.inner_mut(target);
        inner.keys.insert(slot, new_key);
        inner.children.insert(slot + 1, new_child);
        step
    }

    // ============================================================================
    // SPLITTING
    // ============================================================================

    /// Move the upper half of a full leaf into a new right sibling.
    ///
    /// Returns the left leaf's new maximum and the new leaf's id.
    fn split_leaf(&mut self, leaf_id: NodeId) -> (K, NodeId) {
        let right_id = self.allocate_leaf();

        let leaf = self.leaf_mut(leaf_id);
        let mid = leaf.len() / 2;
        let keys = leaf.keys.split_off(mid);
        let values = leaf.values.split_off(mid);
        let old_next = leaf.next;
        leaf.next = right_id;
        let separator = leaf.keys[mid - 1].clone();

        let right = self.leaf_mut(right_id);
        right.keys.extend(keys);
        right.values.extend(values);
        right.prev = leaf_id;
        right.next = old_next;

        if old_next == NULL_NODE {
            self.tail_leaf = right_id;
        } else {
            self.leaf_mut(old_next).prev = right_id;
        }

        trace_log!(leaf = leaf_id, new_leaf = right_id, mid, "split leaf");
        (separator, right_id)
    }

    /// Split a full inner node that is about to receive a child at
    /// `add_slot + 1`.
    ///
    /// The midpoint moves one slot left when the new child lands in the left
    /// half and the left half would otherwise end up larger. The key at the
    /// midpoint leaves both halves and is returned as the separator.
    fn split_inner(&mut self, inner_id: NodeId, add_slot: usize) -> (K, NodeId) {
        let inner = self.inner(inner_id);
        let len = inner.len();
        let level = inner.level;

        let mut mid = len / 2;
        if add_slot <= mid && mid > len - (mid + 1) {
            mid -= 1;
        }

        let right_id = self.allocate_inner(level);

        let inner = self.inner_mut(inner_id);
        let keys = inner.keys.split_off(mid + 1);
        let children = inner.children.split_off(mid + 1);
        let separator = match inner.keys.pop() {
            Some(key) => key,
            None => panic!("corrupted tree: inner node {} split with no keys", inner_id),
        };

        let right = self.inner_mut(right_id);
        right.keys.extend(keys);
        right.children.extend(children);

        trace_log!(inner = inner_id, new_inner = right_id, level, mid, "split inner");
        (separator, right_id)
    }

    /// Replace the root with a new inner node over `old_root` and the split
    /// sibling.
    fn grow_root(&mut self, old_root: NodeRef, split: Split<K>) {
        let level = self.node_level(old_root) + 1;
        let root_id = self.allocate_inner(level);

        let root = self.inner_mut(root_id);
        root.keys.push(split.separator);
        root.children.push(old_root);
        root.children.push(split.node);

        self.root = Some(NodeRef::Inner(root_id));
        trace_log!(root = root_id, level, "root grew");
    }
}

// ============================================================================
// SET OPERATIONS
// ============================================================================

impl<K: Ord + Clone, A: NodeAllocator> BPlusTreeMap<K, (), A> {
    /// Insert a key into a set-shaped tree.
    pub fn insert_key(&mut self, key: K) -> (Position, bool) {
        self.insert(key, ())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{BPlusTreeMap, NodeRef};

    #[test]
    fn test_single_leaf_split_keeps_minimum_occupancy() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for key in [10, 20, 30, 40] {
            tree.insert(key, key);
        }
        assert_eq!(tree.get_stats().leaves, 1);

        let (pos, inserted) = tree.insert(25, 25);
        assert!(inserted);
        assert_eq!(tree.key_at(pos), Some(&25));
        assert_eq!(tree.get_stats().leaves, 2);
        assert_eq!(tree.leaf_sizes(), vec![2, 3]);
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), [10, 20, 25, 30, 40]);
        tree.verify();
    }

    #[test]
    fn test_separator_is_left_maximum() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for key in [1, 2, 3, 4, 5] {
            tree.insert(key, ());
        }
        let Some(NodeRef::Inner(root)) = tree.root() else {
            panic!("five keys in capacity-4 leaves need an inner root");
        };
        assert_eq!(tree.get_inner(root).unwrap().keys(), &[2]);
    }

    #[test]
    fn test_duplicate_rejected_without_change() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for key in 0..20 {
            tree.insert(key, key);
        }
        let before = tree.len();
        let (pos, inserted) = tree.insert(7, 700);
        assert!(!inserted);
        assert_eq!(tree.value_at(pos), Some(&7));
        assert_eq!(tree.len(), before);
        assert!(tree.try_insert(7, 1).is_err());
        assert!(tree.try_insert(99, 1).is_ok());
    }

    #[test]
    fn test_descending_inserts_split_inner_nodes() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for key in (0..500).rev() {
            tree.insert(key, key * 3);
            tree.verify();
        }
        assert!(tree.height() >= 4);
        assert_eq!(tree.len(), 500);
        assert!(tree.items().map(|(k, v)| *v == k * 3).all(|ok| ok));
    }

    #[test]
    fn test_interleaved_inserts_hit_boundary_split() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for round in 0..8 {
            for key in (round..400).step_by(8) {
                tree.insert(key, ());
            }
            tree.verify();
        }
        assert_eq!(tree.len(), 400);
    }

    #[test]
    fn test_insert_range_counts_new_entries() {
        let mut tree = BPlusTreeMap::new(8).unwrap();
        let inserted = tree.insert_range((0..10).chain(5..15).map(|k| (k, k)));
        assert_eq!(inserted, 15);
        assert_eq!(tree.len(), 15);
    }

    #[test]
    fn test_set_insert_key() {
        let mut set = BPlusTreeMap::new(4).unwrap();
        assert!(set.insert_key("b").1);
        assert!(set.insert_key("a").1);
        assert!(!set.insert_key("b").1);
        assert_eq!(set.keys().copied().collect::<Vec<_>>(), ["a", "b"]);
    }
}
