//! Validation and debugging utilities for BPlusTreeMap.
//!
//! The verifier walks the whole tree and the leaf chain and reports the
//! first violated invariant. Mutations call it after every change when
//! `TreeConfig::self_verify` is set, which the `testing` feature turns on by
//! default.

use std::fmt::{Debug, Write};

use crate::allocator::NodeAllocator;
use crate::search::{key_equal, key_less, key_less_equal};
use crate::types::{BPlusTreeMap, NodeId, NodeRef, TreeStats, NULL_NODE};

/// Key bounds and outermost leaves of a verified subtree.
struct Subtree<'a, K> {
    min: &'a K,
    max: &'a K,
    first_leaf: NodeId,
    last_leaf: NodeId,
}

// ============================================================================
// VALIDATION METHODS
// ============================================================================

impl<K: Ord, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Check if the tree maintains B+ tree invariants.
    /// Returns true if all invariants are satisfied.
    pub fn check_invariants(&self) -> bool {
        self.check_invariants_detailed().is_ok()
    }

    /// Check invariants with detailed error reporting.
    pub fn check_invariants_detailed(&self) -> Result<(), String> {
        let mut counted = TreeStats::default();
        if let Some(root) = self.root {
            let level = match root {
                NodeRef::Leaf(_) => 0,
                NodeRef::Inner(id) => self
                    .get_inner(id)
                    .map(|inner| inner.level)
                    .ok_or_else(|| format!("root inner node {} is not allocated", id))?,
            };
            let whole = self.check_node(root, level, true, &mut counted)?;
            if whole.first_leaf != self.head_leaf || whole.last_leaf != self.tail_leaf {
                return Err(format!(
                    "leaf chain runs from {} to {} but the tree spans leaves {} to {}",
                    self.head_leaf, self.tail_leaf, whole.first_leaf, whole.last_leaf
                ));
            }
        }

        if counted.item_count != self.stats.item_count {
            return Err(format!(
                "item count is {} but leaves hold {}",
                self.stats.item_count, counted.item_count
            ));
        }
        if counted.leaves != self.stats.leaves || counted.inner_nodes != self.stats.inner_nodes {
            return Err(format!(
                "stats report {} leaves and {} inner nodes but the tree has {} and {}",
                self.stats.leaves, self.stats.inner_nodes, counted.leaves, counted.inner_nodes
            ));
        }
        if self.leaf_arena.len() != counted.leaves || self.inner_arena.len() != counted.inner_nodes {
            return Err(format!(
                "arenas hold {} leaves and {} inner nodes but the tree reaches {} and {}",
                self.leaf_arena.len(),
                self.inner_arena.len(),
                counted.leaves,
                counted.inner_nodes
            ));
        }

        self.check_leaf_chain()
    }

    /// Panic with a description of the first violated invariant.
    pub fn verify(&self) {
        if let Err(violation) = self.check_invariants_detailed() {
            panic!("B+ tree invariant violated: {}", violation);
        }
    }

    /// Run the verifier after `operation` when self-verification is enabled.
    pub(crate) fn verify_if_enabled(&self, operation: &str) {
        if !self.config.self_verify {
            return;
        }
        if let Err(violation) = self.check_invariants_detailed() {
            panic!("B+ tree invariant violated after {}: {}", operation, violation);
        }
    }

    fn keys_in_order(&self, a: &K, b: &K) -> bool {
        if self.config.duplicates {
            key_less_equal(a, b)
        } else {
            key_less(a, b)
        }
    }

    fn check_node(
        &self,
        node: NodeRef,
        expected_level: u16,
        is_root: bool,
        counted: &mut TreeStats,
    ) -> Result<Subtree<'_, K>, String> {
        match node {
            NodeRef::Leaf(id) => {
                let leaf = self
                    .get_leaf(id)
                    .ok_or_else(|| format!("leaf {} is not allocated", id))?;
                if expected_level != 0 {
                    return Err(format!("leaf {} found at level {}", id, expected_level));
                }
                if leaf.keys.len() != leaf.values.len() {
                    return Err(format!(
                        "leaf {} has {} keys but {} values",
                        id,
                        leaf.keys.len(),
                        leaf.values.len()
                    ));
                }
                if leaf.len() > leaf.capacity {
                    return Err(format!("leaf {} holds {} of {} slots", id, leaf.len(), leaf.capacity));
                }
                if leaf.is_empty() {
                    return Err(format!("leaf {} is empty", id));
                }
                if !is_root && leaf.is_underflow() {
                    return Err(format!(
                        "leaf {} holds {} entries, minimum is {}",
                        id,
                        leaf.len(),
                        leaf.min_keys()
                    ));
                }
                if let Some(slot) = leaf.keys.windows(2).position(|pair| !self.keys_in_order(&pair[0], &pair[1])) {
                    return Err(format!("leaf {} keys out of order at slot {}", id, slot + 1));
                }

                counted.leaves += 1;
                counted.item_count += leaf.len();
                Ok(Subtree {
                    min: &leaf.keys[0],
                    max: &leaf.keys[leaf.len() - 1],
                    first_leaf: id,
                    last_leaf: id,
                })
            }
            NodeRef::Inner(id) => {
                let inner = self
                    .get_inner(id)
                    .ok_or_else(|| format!("inner node {} is not allocated", id))?;
                if inner.level != expected_level || inner.level == 0 {
                    return Err(format!(
                        "inner node {} has level {}, expected {}",
                        id, inner.level, expected_level
                    ));
                }
                if inner.children.len() != inner.keys.len() + 1 {
                    return Err(format!(
                        "inner node {} has {} keys and {} children",
                        id,
                        inner.keys.len(),
                        inner.children.len()
                    ));
                }
                if inner.len() > inner.capacity {
                    return Err(format!(
                        "inner node {} holds {} of {} keys",
                        id,
                        inner.len(),
                        inner.capacity
                    ));
                }
                if inner.is_empty() || (!is_root && inner.is_underflow()) {
                    return Err(format!(
                        "inner node {} holds {} keys, minimum is {}",
                        id,
                        inner.len(),
                        if is_root { 1 } else { inner.min_keys() }
                    ));
                }
                if let Some(slot) = inner.keys.windows(2).position(|pair| !self.keys_in_order(&pair[0], &pair[1])) {
                    return Err(format!("inner node {} keys out of order at slot {}", id, slot + 1));
                }

                let mut bounds: Option<Subtree<'_, K>> = None;
                for (slot, &child) in inner.children.iter().enumerate() {
                    let sub = self.check_node(child, inner.level - 1, false, counted)?;
                    if let Some(left) = &bounds {
                        self.check_leaf_link(id, left.last_leaf, sub.first_leaf)?;
                    }
                    if slot < inner.len() && !key_equal(sub.max, &inner.keys[slot]) {
                        return Err(format!(
                            "inner node {} separator {} is not the maximum of its child",
                            id, slot
                        ));
                    }
                    if slot > 0 && !self.keys_in_order(&inner.keys[slot - 1], sub.min) {
                        return Err(format!(
                            "inner node {} child {} holds a key not above separator {}",
                            id,
                            slot,
                            slot - 1
                        ));
                    }
                    bounds = Some(match bounds {
                        None => sub,
                        Some(left) => Subtree {
                            min: left.min,
                            max: sub.max,
                            first_leaf: left.first_leaf,
                            last_leaf: sub.last_leaf,
                        },
                    });
                }

                counted.inner_nodes += 1;
                bounds.ok_or_else(|| format!("inner node {} has no children", id))
            }
        }
    }

    /// Adjacent subtrees of `parent` must meet in the leaf chain: the last
    /// leaf on the left links to the first leaf on the right.
    fn check_leaf_link(&self, parent: NodeId, left: NodeId, right: NodeId) -> Result<(), String> {
        let linked = self.get_leaf(left).is_some_and(|leaf| leaf.next == right)
            && self.get_leaf(right).is_some_and(|leaf| leaf.prev == left);
        if !linked {
            return Err(format!(
                "leaves {} and {} under inner node {} are not linked",
                left, right, parent
            ));
        }
        Ok(())
    }

    /// Walk the leaf chain from head to tail.
    fn check_leaf_chain(&self) -> Result<(), String> {
        if self.root.is_none() {
            if self.head_leaf != NULL_NODE || self.tail_leaf != NULL_NODE {
                return Err("empty tree still has a leaf chain".to_string());
            }
            return Ok(());
        }

        let mut prev = NULL_NODE;
        let mut current = self.head_leaf;
        let mut prev_last: Option<&K> = None;
        let mut leaves = 0;
        let mut items = 0;

        while current != NULL_NODE {
            if leaves == self.stats.leaves {
                return Err(format!("leaf chain is longer than {} leaves", self.stats.leaves));
            }
            let leaf = self
                .get_leaf(current)
                .ok_or_else(|| format!("leaf chain reaches unallocated leaf {}", current))?;
            if leaf.prev != prev {
                return Err(format!(
                    "leaf {} points back to {} instead of {}",
                    current, leaf.prev, prev
                ));
            }
            if let (Some(last), Some(first)) = (prev_last, leaf.first_key()) {
                if !self.keys_in_order(last, first) {
                    return Err(format!("leaf {} starts below the end of leaf {}", current, prev));
                }
            }

            leaves += 1;
            items += leaf.len();
            prev_last = leaf.last_key();
            prev = current;
            current = leaf.next;
        }

        if prev != self.tail_leaf {
            return Err(format!("leaf chain ends at {} but tail is {}", prev, self.tail_leaf));
        }
        if leaves != self.stats.leaves || items != self.stats.item_count {
            return Err(format!(
                "leaf chain visits {} leaves and {} items, expected {} and {}",
                leaves, items, self.stats.leaves, self.stats.item_count
            ));
        }
        Ok(())
    }
}

// ============================================================================
// DEBUGGING HELPERS
// ============================================================================

impl<K, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Occupancy of every leaf in chain order.
    pub fn leaf_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.stats.leaves);
        let mut current = self.head_leaf;
        while let Some(leaf) = self.leaf_arena.get(current) {
            sizes.push(leaf.len());
            current = leaf.next;
        }
        sizes
    }

    /// Indented rendering of every node, one per line.
    pub fn format_tree(&self) -> String
    where
        K: Debug,
    {
        let mut out = String::new();
        if let Some(root) = self.root {
            self.format_node(root, 0, &mut out);
        }
        out
    }

    /// Print the tree structure to stdout.
    pub fn print_node_chain(&self)
    where
        K: Debug,
    {
        print!("{}", self.format_tree());
    }

    fn format_node(&self, node: NodeRef, depth: usize, out: &mut String)
    where
        K: Debug,
    {
        let indent = "  ".repeat(depth);
        match node {
            NodeRef::Leaf(id) => {
                if let Some(leaf) = self.get_leaf(id) {
                    let _ = writeln!(out, "{}leaf {}: {:?}", indent, id, leaf.keys);
                }
            }
            NodeRef::Inner(id) => {
                if let Some(inner) = self.get_inner(id) {
                    let _ = writeln!(out, "{}inner {} (level {}): {:?}", indent, id, inner.level, inner.keys);
                    for &child in &inner.children {
                        self.format_node(child, depth + 1, out);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TreeConfig;
    use crate::types::{BPlusTreeMap, NodeId, NodeRef, NULL_NODE};

    fn sample() -> BPlusTreeMap<i32, i32> {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for i in 0..40 {
            tree.insert(i, i);
        }
        tree
    }

    #[test]
    fn test_valid_tree_passes() {
        let tree = sample();
        assert!(tree.check_invariants());
        assert_eq!(tree.check_invariants_detailed(), Ok(()));
        assert_eq!(tree.leaf_sizes().iter().sum::<usize>(), 40);
    }

    #[test]
    fn test_detects_broken_separator() {
        let mut tree = sample();
        let Some(NodeRef::Inner(root)) = tree.root else {
            panic!("expected an inner root");
        };
        tree.inner_mut(root).keys[0] = 1000;
        assert!(tree.check_invariants_detailed().unwrap_err().contains("separator"));
    }

    #[test]
    fn test_detects_broken_leaf_link() {
        let mut tree = sample();
        let head = tree.head_leaf;
        tree.leaf_mut(head).next = NULL_NODE;
        let err = tree.check_invariants_detailed().unwrap_err();
        assert!(err.contains("linked") || err.contains("leaf chain"), "{}", err);
    }

    /// Leaf ids under each level-1 node, left to right.
    fn leaf_groups<V>(tree: &BPlusTreeMap<i32, V>) -> Vec<Vec<NodeId>> {
        fn walk<V>(tree: &BPlusTreeMap<i32, V>, node: NodeRef, groups: &mut Vec<Vec<NodeId>>) {
            let NodeRef::Inner(id) = node else { return };
            let inner = tree.inner(id);
            if inner.level == 1 {
                groups.push(inner.children.iter().map(|child| child.id()).collect());
            } else {
                for &child in &inner.children {
                    walk(tree, child, groups);
                }
            }
        }
        let mut groups = Vec::new();
        walk(tree, tree.root.unwrap(), &mut groups);
        groups
    }

    #[test]
    fn test_detects_leaf_groups_swapped_across_parents() {
        let mut tree = BPlusTreeMap::multimap(4).unwrap();
        for value in 0..120 {
            tree.insert(1, value);
        }
        assert!(tree.height() >= 3);
        tree.verify();

        // Relink the chain as B, A, rest. Every parent still sees its own
        // leaves linked in order and all keys are equal.
        let groups = leaf_groups(&tree);
        let (a_first, a_last) = (groups[0][0], *groups[0].last().unwrap());
        let (b_first, b_last) = (groups[1][0], *groups[1].last().unwrap());
        let rest = tree.leaf(b_last).next;

        tree.head_leaf = b_first;
        tree.leaf_mut(b_first).prev = NULL_NODE;
        tree.leaf_mut(b_last).next = a_first;
        tree.leaf_mut(a_first).prev = b_last;
        tree.leaf_mut(a_last).next = rest;
        if rest == NULL_NODE {
            tree.tail_leaf = a_last;
        } else {
            tree.leaf_mut(rest).prev = a_last;
        }

        let err = tree.check_invariants_detailed().unwrap_err();
        assert!(err.contains("not linked") || err.contains("spans"), "{}", err);
    }

    #[test]
    fn test_detects_head_not_leftmost_leaf() {
        let mut tree = sample();
        let groups = leaf_groups(&tree);
        let second = groups[0][1];
        tree.leaf_mut(second).prev = NULL_NODE;
        tree.head_leaf = second;
        assert!(tree.check_invariants_detailed().is_err());
    }

    #[test]
    fn test_detects_stale_item_count() {
        let mut tree = sample();
        tree.stats.item_count += 1;
        assert!(tree.check_invariants_detailed().unwrap_err().contains("item count"));
    }

    #[test]
    #[should_panic(expected = "invariant violated after insert")]
    fn test_self_verify_panics_on_corruption() {
        let mut tree = BPlusTreeMap::with_config(TreeConfig::with_capacity(4).self_verify(true)).unwrap();
        tree.insert(1, 1);
        tree.stats.item_count = 5;
        tree.insert(2, 2);
    }

    #[test]
    fn test_format_tree() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for i in 1..=5 {
            tree.insert(i, ());
        }
        let text = tree.format_tree();
        assert!(text.starts_with("inner"));
        assert_eq!(text.lines().count(), 3);
    }
}
