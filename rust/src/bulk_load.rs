//! Bottom-up construction of a tree from sorted input.
//!
//! Entries are spread as evenly as possible over the minimum number of
//! leaves, then each level of inner nodes is built over the one below in the
//! same way, until a single node remains as the root.

use crate::allocator::NodeAllocator;
use crate::error::{BPlusTreeError, ModifyResult};
use crate::search::{key_less, key_less_equal};
use crate::tracing_helpers::{debug_log, warn_log};
use crate::types::{BPlusTreeMap, NodeRef, NULL_NODE};

/// Index of the first key that breaks the required order, if any.
fn first_unsorted<K: Ord>(keys: &[K], duplicates: bool) -> Option<usize> {
    keys.windows(2)
        .position(|pair| {
            if duplicates {
                !key_less_equal(&pair[0], &pair[1])
            } else {
                !key_less(&pair[0], &pair[1])
            }
        })
        .map(|index| index + 1)
}

impl<K: Ord + Clone, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Build the tree from entries already sorted by key.
    ///
    /// The tree must be empty. Keys must be strictly increasing, or
    /// non-decreasing when duplicates are allowed. Invalid input is rejected
    /// before any node is allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(4).unwrap();
    /// tree.bulk_load((0..100).map(|i| (i, i * i))).unwrap();
    /// assert_eq!(tree.len(), 100);
    /// assert_eq!(tree.get(&9), Some(&81));
    ///
    /// let mut unsorted = BPlusTreeMap::new(4).unwrap();
    /// assert!(unsorted.bulk_load([(2, ()), (1, ())]).is_err());
    /// ```
    pub fn bulk_load<I>(&mut self, items: I) -> ModifyResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        if self.root.is_some() {
            warn_log!(len = self.len(), "bulk_load rejected: tree is not empty");
            return Err(BPlusTreeError::invalid_state("bulk_load", "tree is not empty"));
        }

        let (keys, values): (Vec<K>, Vec<V>) = items.into_iter().unzip();
        if let Some(index) = first_unsorted(&keys, self.config.duplicates) {
            warn_log!(index, "bulk_load rejected: input is not sorted");
            return Err(BPlusTreeError::unsorted_input(index));
        }
        if keys.is_empty() {
            return Ok(());
        }

        let item_count = keys.len();
        let (mut nodes, mut maxes) = self.build_leaves(keys, values);
        let leaves = nodes.len();

        let mut level = 0;
        while nodes.len() > 1 {
            level += 1;
            (nodes, maxes) = self.build_inner_level(&nodes, &maxes, level);
        }

        self.root = nodes.first().copied();
        self.stats.item_count = item_count;
        debug_log!(items = item_count, leaves, height = level + 1, "bulk load complete");
        self.verify_if_enabled("bulk_load");
        Ok(())
    }

    /// Spread the entries over linked leaves. Returns the leaves and the
    /// maximum key of each.
    fn build_leaves(&mut self, keys: Vec<K>, values: Vec<V>) -> (Vec<NodeRef>, Vec<K>) {
        let total = keys.len();
        let num_leaves = total.div_ceil(self.config.leaf_capacity);
        let mut nodes = Vec::with_capacity(num_leaves);
        let mut maxes = Vec::with_capacity(num_leaves);

        let mut keys = keys.into_iter();
        let mut values = values.into_iter();
        let mut remaining = total;
        let mut prev = NULL_NODE;

        for i in 0..num_leaves {
            let take = remaining / (num_leaves - i);
            remaining -= take;

            let id = self.allocate_leaf();
            let leaf = self.leaf_mut(id);
            leaf.keys.extend(keys.by_ref().take(take));
            leaf.values.extend(values.by_ref().take(take));
            leaf.prev = prev;
            if let Some(max) = leaf.keys.last() {
                maxes.push(max.clone());
            }

            if prev == NULL_NODE {
                self.head_leaf = id;
            } else {
                self.leaf_mut(prev).next = id;
            }
            prev = id;
            nodes.push(NodeRef::Leaf(id));
        }
        self.tail_leaf = prev;
        (nodes, maxes)
    }

    /// Build one level of inner nodes over `children`, whose maxima are
    /// `maxes`.
    fn build_inner_level(&mut self, children: &[NodeRef], maxes: &[K], level: u16) -> (Vec<NodeRef>, Vec<K>) {
        let total = children.len();
        let num_parents = total.div_ceil(self.config.inner_capacity + 1);
        let mut parents = Vec::with_capacity(num_parents);
        let mut parent_maxes = Vec::with_capacity(num_parents);

        let mut start = 0;
        let mut remaining = total;
        for i in 0..num_parents {
            let take = remaining / (num_parents - i);
            remaining -= take;
            let end = start + take;

            let id = self.allocate_inner(level);
            let inner = self.inner_mut(id);
            inner.children.extend_from_slice(&children[start..end]);
            inner.keys.extend_from_slice(&maxes[start..end - 1]);
            parent_maxes.push(maxes[end - 1].clone());
            parents.push(NodeRef::Inner(id));
            start = end;
        }
        (parents, parent_maxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;

    #[test]
    fn test_first_unsorted() {
        assert_eq!(first_unsorted(&[1, 2, 3], false), None);
        assert_eq!(first_unsorted(&[1, 2, 2], false), Some(2));
        assert_eq!(first_unsorted(&[1, 2, 2], true), None);
        assert_eq!(first_unsorted(&[3, 1], true), Some(1));
        assert_eq!(first_unsorted::<u8>(&[], false), None);
    }

    #[test]
    fn test_bulk_load_sizes() {
        for n in [0usize, 1, 3, 4, 5, 17, 64, 65, 1000] {
            let mut tree = BPlusTreeMap::new(4).unwrap();
            tree.bulk_load((0..n).map(|i| (i, i))).unwrap();
            tree.verify();
            assert_eq!(tree.len(), n);
            assert!(tree.items().map(|(k, v)| k == v).all(|same| same));
            assert_eq!(tree.keys().count(), n);
        }
    }

    #[test]
    fn test_bulk_load_then_mutate() {
        let mut tree = BPlusTreeMap::with_config(TreeConfig::with_capacity(5).inner_capacity(4)).unwrap();
        tree.bulk_load((0..500).map(|i| (i * 2, ()))).unwrap();
        for i in 0..250 {
            tree.insert(i * 4 + 1, ());
        }
        for i in 0..200 {
            assert!(tree.erase_by_key(&(i * 2)));
        }
        tree.verify();
        assert_eq!(tree.len(), 550);
    }

    #[test]
    fn test_bulk_load_rejects_without_side_effects() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        let err = tree.bulk_load([(1, 'a'), (3, 'b'), (2, 'c')]).unwrap_err();
        assert_eq!(err, BPlusTreeError::unsorted_input(2));
        assert!(tree.is_empty());
        assert_eq!(tree.get_stats().nodes(), 0);

        tree.insert(1, 'a');
        assert!(tree.bulk_load([(5, 'e')]).is_err());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_bulk_load_duplicates_in_multimap() {
        let mut tree = BPlusTreeMap::multimap(4).unwrap();
        tree.bulk_load((0..40).map(|i| (i / 10, i))).unwrap();
        tree.verify();
        assert_eq!(tree.count(&2), 10);

        let mut unique = BPlusTreeMap::new(4).unwrap();
        assert!(unique.bulk_load([(1, 0), (1, 1)]).is_err());
    }
}
