//! Tree structure management operations for BPlusTreeMap.
//!
//! This module contains all tree-level operations that manage the overall
//! structure: size queries, clearing, statistics, and the chain ends.

use crate::allocator::NodeAllocator;
use crate::tracing_helpers::debug_log;
use crate::types::{BPlusTreeMap, LeafNode, NodeRef, TreeStats, NULL_NODE};

// ============================================================================
// TREE STRUCTURE OPERATIONS
// ============================================================================

impl<K, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Returns the number of elements in the tree.
    pub fn len(&self) -> usize {
        self.stats.item_count
    }

    /// Returns true if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.stats.item_count == 0
    }

    /// Item, leaf and inner node counts.
    pub fn get_stats(&self) -> &TreeStats {
        &self.stats
    }

    /// Returns true if the root is a leaf node (or the tree is empty).
    pub fn is_leaf_root(&self) -> bool {
        !matches!(self.root, Some(NodeRef::Inner(_)))
    }

    /// The current root, if any.
    pub fn root(&self) -> Option<NodeRef> {
        self.root
    }

    /// Number of levels, counting the leaf level. Zero for an empty tree.
    pub fn height(&self) -> usize {
        self.root.map_or(0, |root| self.node_level(root) as usize + 1)
    }

    pub(crate) fn node_level(&self, node: NodeRef) -> u16 {
        match node {
            NodeRef::Leaf(_) => 0,
            NodeRef::Inner(id) => self.inner(id).level,
        }
    }

    /// Remove every entry and release all nodes through the adapter.
    pub fn clear(&mut self) {
        let released = self.stats.nodes();
        self.release_all_nodes();
        self.leaf_arena.clear();
        self.inner_arena.clear();
        debug_log!(released, "tree cleared");
    }

    /// Free every node reachable from the root and reset to the empty tree.
    pub(crate) fn release_all_nodes(&mut self) {
        if let Some(root) = self.root.take() {
            self.free_subtree(root);
        }
        self.head_leaf = NULL_NODE;
        self.tail_leaf = NULL_NODE;
        self.stats = TreeStats::default();
    }

    pub(crate) fn free_subtree(&mut self, node: NodeRef) {
        match node {
            NodeRef::Leaf(id) => {
                self.free_leaf(id);
            }
            NodeRef::Inner(id) => {
                let children = std::mem::take(&mut self.inner_mut(id).children);
                for child in children {
                    self.free_subtree(child);
                }
                self.free_inner(id);
            }
        }
    }

    /// Leftmost leaf of the chain, if any.
    pub fn first_leaf(&self) -> Option<&LeafNode<K, V>> {
        self.leaf_arena.get(self.head_leaf)
    }

    /// Rightmost leaf of the chain, if any.
    pub fn last_leaf(&self) -> Option<&LeafNode<K, V>> {
        self.leaf_arena.get(self.tail_leaf)
    }
}

#[cfg(test)]
mod tests {
    use crate::allocator::AccountingAllocator;
    use crate::config::TreeConfig;
    use crate::types::{BPlusTreeMap, NodeRef};

    #[test]
    fn test_height_grows_with_splits() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        assert_eq!(tree.height(), 0);
        tree.insert(1, 1);
        assert_eq!(tree.height(), 1);
        assert!(tree.is_leaf_root());
        for i in 2..=5 {
            tree.insert(i, i);
        }
        assert_eq!(tree.height(), 2);
        assert!(!tree.is_leaf_root());
        let root = match tree.root() {
            Some(NodeRef::Inner(id)) => tree.get_inner(id).unwrap(),
            other => panic!("expected an inner root, got {:?}", other),
        };
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn test_clear_releases_nodes_and_resets() {
        let mut tree = BPlusTreeMap::with_config_and_allocator(
            TreeConfig::with_capacity(4),
            AccountingAllocator::new(),
        )
        .unwrap();
        for i in 0..64u32 {
            tree.insert(i, i);
        }
        assert!(tree.get_stats().inner_nodes > 0);

        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(*tree.get_stats(), Default::default());
        assert_eq!(tree.allocator().live_nodes(), 0);
        assert_eq!(tree.begin(), tree.end());
        assert!(tree.first_leaf().is_none());

        tree.insert(7, 7);
        assert_eq!(tree.get(&7), Some(&7));
        tree.verify();
    }

}
