//! DELETE operations for BPlusTreeMap.
//!
//! Erasure descends to the leaf holding the entry, removes it, and repairs
//! the tree on the way back up. Each level receives a [`Fixup`] from the
//! level below: a changed subtree maximum that must replace a separator
//! further up, and whether the child was drained by a merge and must be
//! unlinked.
//!
//! Underflowing nodes are repaired by merging with or borrowing from an
//! adjacent sibling. Only siblings under the same parent are ever modified;
//! siblings under a neighbouring parent are consulted only to decide.

use crate::allocator::NodeAllocator;
use crate::iteration::Position;
use crate::search::{key_equal, key_less};
use crate::tracing_helpers::trace_log;
use crate::types::{BPlusTreeMap, NodeId, NodeRef, NULL_NODE};

// ============================================================================
// DELETION CONTEXT TYPES
// ============================================================================

/// Neighbourhood of the node being descended into.
///
/// `left_parent`/`right_parent` name the inner node holding each sibling.
/// They equal `parent` when the sibling shares this node's parent. The root
/// has no siblings and no parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Siblings {
    pub(crate) left: Option<NodeRef>,
    pub(crate) right: Option<NodeRef>,
    pub(crate) left_parent: Option<NodeId>,
    pub(crate) right_parent: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) parent_slot: usize,
}

/// What the parent must do after a child erased an entry.
#[derive(Debug)]
struct Fixup<K> {
    /// New maximum of the child subtree whose separator lives further up.
    last_key: Option<K>,
    /// The child merged with a sibling, leaving one of them empty.
    merged: bool,
}

impl<K> Default for Fixup<K> {
    fn default() -> Self {
        Self {
            last_key: None,
            merged: false,
        }
    }
}

impl<K> Fixup<K> {
    fn merged() -> Self {
        Self {
            last_key: None,
            merged: true,
        }
    }

    fn absorb(&mut self, other: Fixup<K>) {
        if other.last_key.is_some() {
            self.last_key = other.last_key;
        }
        self.merged |= other.merged;
    }
}

#[derive(Debug)]
enum EraseOutcome<K> {
    NotFound,
    Erased(Fixup<K>),
}

/// Entry to erase: the first one equal to `key`, or the one at `exact`.
struct EraseTarget<'a, K> {
    key: &'a K,
    exact: Option<Position>,
}

/// Occupancy of a sibling as seen by the rebalance planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SiblingLoad {
    pub(crate) len: usize,
    pub(crate) few: bool,
}

/// Repair chosen for an underflowing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rebalance {
    /// The node is the root and has nothing left to route.
    CollapseRoot,
    MergeWithLeft,
    MergeWithRight,
    /// Move entries from the left sibling to the front of this node.
    ShiftFromLeft,
    /// Move entries from the right sibling to the end of this node.
    ShiftFromRight,
}

/// Choose how to repair an underflowing node.
///
/// Merging is preferred when neither sibling can spare an entry, then
/// borrowing from a sibling under the same parent. When both siblings can
/// spare entries the fuller one gives.
pub(crate) fn plan_rebalance(
    ctx: &Siblings,
    left: Option<SiblingLoad>,
    right: Option<SiblingLoad>,
) -> Rebalance {
    let few_or_none = |load: Option<SiblingLoad>| load.map_or(true, |load| load.few);
    let left_is_sibling = ctx.left_parent == ctx.parent;
    let right_is_sibling = ctx.right_parent == ctx.parent;

    match (left, right) {
        (None, None) => Rebalance::CollapseRoot,
        _ if few_or_none(left) && few_or_none(right) => {
            if left_is_sibling {
                Rebalance::MergeWithLeft
            } else {
                Rebalance::MergeWithRight
            }
        }
        (Some(l), Some(_)) if l.few => {
            if right_is_sibling {
                Rebalance::ShiftFromRight
            } else {
                Rebalance::MergeWithLeft
            }
        }
        (Some(_), Some(r)) if r.few => {
            if left_is_sibling {
                Rebalance::ShiftFromLeft
            } else {
                Rebalance::MergeWithRight
            }
        }
        (Some(l), Some(r)) if ctx.left_parent == ctx.right_parent => {
            if l.len <= r.len {
                Rebalance::ShiftFromRight
            } else {
                Rebalance::ShiftFromLeft
            }
        }
        _ => {
            if left_is_sibling {
                Rebalance::ShiftFromLeft
            } else {
                Rebalance::ShiftFromRight
            }
        }
    }
}

#[cold]
#[inline(never)]
fn missing_neighbour(what: &str) -> ! {
    panic!("corrupted tree: rebalance needs a {} that does not exist", what)
}

fn sibling_id(node: Option<NodeRef>, side: &str) -> NodeId {
    match node {
        Some(node) => node.id(),
        None => missing_neighbour(side),
    }
}

fn parent_id(ctx: &Siblings) -> NodeId {
    match ctx.parent {
        Some(parent) => parent,
        None => missing_neighbour("parent"),
    }
}

impl<K: Ord + Clone, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    // ============================================================================
    // PUBLIC DELETE OPERATIONS
    // ============================================================================

    /// Erase the first entry equal to `key`.
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(4).unwrap();
    /// tree.insert(1, "one");
    /// assert!(tree.erase_by_key(&1));
    /// assert!(!tree.erase_by_key(&1));
    /// assert!(tree.is_empty());
    /// ```
    pub fn erase_by_key(&mut self, key: &K) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Erase every entry equal to `key`, returning how many were removed.
    pub fn erase_all(&mut self, key: &K) -> usize {
        let mut erased = 0;
        while self.erase_by_key(key) {
            erased += 1;
        }
        erased
    }

    /// Remove the first entry equal to `key` and return its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Remove the first entry equal to `key` and return it.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        self.erase_target(&EraseTarget { key, exact: None })
    }

    /// Erase the entry at `position`.
    ///
    /// Among several equal keys exactly the addressed entry is removed.
    /// Returns `false` if `position` does not address an entry. Every
    /// position into the tree is invalidated by a successful erase.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::multimap(4).unwrap();
    /// tree.insert(7, "a");
    /// tree.insert(7, "b");
    /// let second = tree.next_position(tree.find(&7).unwrap());
    /// assert_eq!(tree.value_at(second), Some(&"a"));
    /// assert!(tree.erase_by_position(second));
    /// assert_eq!(tree.get(&7), Some(&"b"));
    /// assert!(!tree.erase_by_position(tree.end()));
    /// ```
    pub fn erase_by_position(&mut self, position: Position) -> bool {
        let Some(key) = self.key_at(position).cloned() else {
            return false;
        };
        self.erase_target(&EraseTarget {
            key: &key,
            exact: Some(position),
        })
        .is_some()
    }

    fn erase_target(&mut self, target: &EraseTarget<'_, K>) -> Option<(K, V)> {
        let root = self.root?;
        let mut removed = None;
        match self.erase_descend(root, target, Siblings::default(), &mut removed) {
            EraseOutcome::NotFound => None,
            EraseOutcome::Erased(_) => {
                self.stats.item_count -= 1;
                self.verify_if_enabled("erase");
                removed
            }
        }
    }

    // ============================================================================
    // RECURSIVE DESCENT
    // ============================================================================

    fn erase_descend(
        &mut self,
        node: NodeRef,
        target: &EraseTarget<'_, K>,
        ctx: Siblings,
        removed: &mut Option<(K, V)>,
    ) -> EraseOutcome<K> {
        match node {
            NodeRef::Leaf(id) => self.erase_from_leaf(id, target, ctx, removed),
            NodeRef::Inner(id) => self.erase_from_inner(id, target, ctx, removed),
        }
    }

    fn erase_from_leaf(
        &mut self,
        leaf_id: NodeId,
        target: &EraseTarget<'_, K>,
        ctx: Siblings,
        removed: &mut Option<(K, V)>,
    ) -> EraseOutcome<K> {
        let leaf = self.leaf(leaf_id);
        let slot = match target.exact {
            Some(position) => {
                if position.leaf() != leaf_id || position.slot() >= leaf.len() {
                    return EraseOutcome::NotFound;
                }
                position.slot()
            }
            None => {
                let slot = self.find_lower(&leaf.keys, leaf.capacity, target.key);
                if slot >= leaf.len() || !key_equal(&leaf.keys[slot], target.key) {
                    return EraseOutcome::NotFound;
                }
                slot
            }
        };

        let leaf = self.leaf_mut(leaf_id);
        let key = leaf.keys.remove(slot);
        let value = leaf.values.remove(slot);
        *removed = Some((key, value));

        let mut fixup = Fixup::default();
        if slot == leaf.len() {
            if let Some(last) = leaf.keys.last().cloned() {
                fixup.last_key = self.update_parent_separator(&ctx, last);
            }
        }

        let leaf = self.leaf(leaf_id);
        let is_root = ctx.parent.is_none();
        if leaf.is_underflow() && !(is_root && !leaf.is_empty()) {
            fixup.absorb(self.rebalance_leaf(leaf_id, &ctx));
        }
        EraseOutcome::Erased(fixup)
    }

    fn erase_from_inner(
        &mut self,
        inner_id: NodeId,
        target: &EraseTarget<'_, K>,
        ctx: Siblings,
        removed: &mut Option<(K, V)>,
    ) -> EraseOutcome<K> {
        let inner = self.inner(inner_id);
        let mut slot = self.find_lower(&inner.keys, inner.capacity, target.key);

        let child_fixup = loop {
            let child = self.inner(inner_id).children[slot];
            let child_ctx = self.child_context(inner_id, slot, &ctx);
            match self.erase_descend(child, target, child_ctx, removed) {
                EraseOutcome::Erased(fixup) => break fixup,
                EraseOutcome::NotFound if target.exact.is_some() => {
                    // Equal keys may continue into the next child.
                    let inner = self.inner(inner_id);
                    if slot >= inner.len() || key_less(target.key, &inner.keys[slot]) {
                        return EraseOutcome::NotFound;
                    }
                    slot += 1;
                }
                EraseOutcome::NotFound => return EraseOutcome::NotFound,
            }
        };

        // The separator above this node must be current before rebalancing,
        // since shifts and merges read it and rewrite it.
        let mut fixup = Fixup::default();
        if let Some(last) = child_fixup.last_key {
            if slot < self.inner(inner_id).len() {
                self.inner_mut(inner_id).keys[slot] = last;
            } else {
                fixup.last_key = self.update_parent_separator(&ctx, last);
            }
        }
        if child_fixup.merged {
            self.remove_merged_child(inner_id, slot);
        }

        let inner = self.inner(inner_id);
        let is_root = ctx.parent.is_none();
        if inner.is_underflow() && !(is_root && !inner.is_empty()) {
            fixup.absorb(self.rebalance_inner(inner_id, &ctx));
        }
        EraseOutcome::Erased(fixup)
    }

    /// Store the new maximum of the node described by `ctx` in its parent.
    /// A last child has no separator of its own, so the key is handed back
    /// for the next level up.
    fn update_parent_separator(&mut self, ctx: &Siblings, last: K) -> Option<K> {
        match ctx.parent {
            Some(parent) if ctx.parent_slot < self.inner(parent).len() => {
                self.inner_mut(parent).keys[ctx.parent_slot] = last;
                None
            }
            _ => Some(last),
        }
    }

    /// Neighbourhood of `children[slot]` of `inner_id`, whose own
    /// neighbourhood is `ctx`.
    fn child_context(&self, inner_id: NodeId, slot: usize, ctx: &Siblings) -> Siblings {
        let inner = self.inner(inner_id);

        let (left, left_parent) = if slot == 0 {
            match ctx.left {
                Some(NodeRef::Inner(left)) => (self.inner(left).last_child(), Some(left)),
                _ => (None, None),
            }
        } else {
            (Some(inner.children[slot - 1]), Some(inner_id))
        };

        let (right, right_parent) = if slot == inner.len() {
            match ctx.right {
                Some(NodeRef::Inner(right)) => (self.inner(right).first_child(), Some(right)),
                _ => (None, None),
            }
        } else {
            (Some(inner.children[slot + 1]), Some(inner_id))
        };

        Siblings {
            left,
            right,
            left_parent,
            right_parent,
            parent: Some(inner_id),
            parent_slot: slot,
        }
    }

    /// Unlink and free whichever of `children[slot]` and its right neighbour
    /// was drained by a merge.
    fn remove_merged_child(&mut self, inner_id: NodeId, slot: usize) {
        let inner = self.inner(inner_id);
        let mut slot = slot;
        if !self.is_drained(inner.children[slot]) {
            slot += 1;
        }

        match self.inner(inner_id).children[slot] {
            NodeRef::Leaf(id) => {
                self.free_leaf(id);
            }
            NodeRef::Inner(id) => {
                self.free_inner(id);
            }
        }

        let inner = self.inner_mut(inner_id);
        inner.keys.remove(slot - 1);
        inner.children.remove(slot);

        if inner.level == 1 && slot - 1 < inner.keys.len() {
            if let NodeRef::Leaf(survivor) = inner.children[slot - 1] {
                if let Some(last) = self.leaf(survivor).last_key().cloned() {
                    self.inner_mut(inner_id).keys[slot - 1] = last;
                }
            }
        }
    }

    fn is_drained(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Leaf(id) => self.leaf(id).is_empty(),
            NodeRef::Inner(id) => self.inner(id).children.is_empty(),
        }
    }

    // ============================================================================
    // LEAF REBALANCING
    // ============================================================================

    fn rebalance_leaf(&mut self, leaf_id: NodeId, ctx: &Siblings) -> Fixup<K> {
        let load = |node: Option<NodeRef>| {
            node.map(|node| {
                let leaf = self.leaf(node.id());
                SiblingLoad {
                    len: leaf.len(),
                    few: leaf.is_few(),
                }
            })
        };
        let plan = plan_rebalance(ctx, load(ctx.left), load(ctx.right));
        trace_log!(leaf = leaf_id, ?plan, "rebalance leaf");

        match plan {
            Rebalance::CollapseRoot => {
                self.free_leaf(leaf_id);
                self.root = None;
                self.head_leaf = NULL_NODE;
                self.tail_leaf = NULL_NODE;
                Fixup::default()
            }
            Rebalance::MergeWithLeft => {
                self.merge_leaves(sibling_id(ctx.left, "left sibling"), leaf_id);
                Fixup::merged()
            }
            Rebalance::MergeWithRight => {
                self.merge_leaves(leaf_id, sibling_id(ctx.right, "right sibling"));
                Fixup::merged()
            }
            Rebalance::ShiftFromLeft => {
                let left_id = sibling_id(ctx.left, "left sibling");
                self.shift_right_leaf(left_id, leaf_id, parent_id(ctx), ctx.parent_slot - 1);
                Fixup::default()
            }
            Rebalance::ShiftFromRight => {
                let right_id = sibling_id(ctx.right, "right sibling");
                self.shift_left_leaf(leaf_id, right_id, parent_id(ctx), ctx.parent_slot);
                Fixup::default()
            }
        }
    }

    /// Append all of `right_id` to `left_id` and unlink `right_id` from the
    /// chain. The drained leaf is freed by its parent.
    fn merge_leaves(&mut self, left_id: NodeId, right_id: NodeId) {
        let right = self.leaf_mut(right_id);
        let keys = std::mem::take(&mut right.keys);
        let values = std::mem::take(&mut right.values);
        let next = right.next;

        let left = self.leaf_mut(left_id);
        left.keys.extend(keys);
        left.values.extend(values);
        left.next = next;

        if next == NULL_NODE {
            self.tail_leaf = left_id;
        } else {
            self.leaf_mut(next).prev = left_id;
        }
        trace_log!(left = left_id, right = right_id, "merged leaves");
    }

    /// Move the first entries of `right_id` to the end of `left_id`.
    /// `parent_slot` is the separator slot of `left_id`.
    fn shift_left_leaf(&mut self, left_id: NodeId, right_id: NodeId, parent: NodeId, parent_slot: usize) {
        let left_len = self.leaf(left_id).len();
        let right = self.leaf_mut(right_id);
        let count = (right.len() - left_len) / 2;
        let keys: Vec<K> = right.keys.drain(..count).collect();
        let values: Vec<V> = right.values.drain(..count).collect();

        let left = self.leaf_mut(left_id);
        left.keys.extend(keys);
        left.values.extend(values);
        if let Some(last) = left.keys.last().cloned() {
            self.inner_mut(parent).keys[parent_slot] = last;
        }
        trace_log!(from = right_id, to = left_id, count, "shifted entries left");
    }

    /// Move the last entries of `left_id` to the front of `right_id`.
    /// `parent_slot` is the separator slot of `left_id`.
    fn shift_right_leaf(&mut self, left_id: NodeId, right_id: NodeId, parent: NodeId, parent_slot: usize) {
        let right_len = self.leaf(right_id).len();
        let left = self.leaf_mut(left_id);
        let count = (left.len() - right_len) / 2;
        let split_at = left.len() - count;
        let keys = left.keys.split_off(split_at);
        let values = left.values.split_off(split_at);
        let new_max = left.keys.last().cloned();

        let right = self.leaf_mut(right_id);
        right.keys.splice(0..0, keys);
        right.values.splice(0..0, values);
        if let Some(last) = new_max {
            self.inner_mut(parent).keys[parent_slot] = last;
        }
        trace_log!(from = left_id, to = right_id, count, "shifted entries right");
    }

    // ============================================================================
    // INNER REBALANCING
    // ============================================================================

    fn rebalance_inner(&mut self, inner_id: NodeId, ctx: &Siblings) -> Fixup<K> {
        let load = |node: Option<NodeRef>| {
            node.map(|node| {
                let inner = self.inner(node.id());
                SiblingLoad {
                    len: inner.len(),
                    few: inner.is_few(),
                }
            })
        };
        let plan = plan_rebalance(ctx, load(ctx.left), load(ctx.right));
        trace_log!(inner = inner_id, ?plan, "rebalance inner");

        match plan {
            Rebalance::CollapseRoot => {
                let inner = self.free_inner(inner_id);
                self.root = inner.children.first().copied();
                trace_log!(old_root = inner_id, "root collapsed");
                Fixup::default()
            }
            Rebalance::MergeWithLeft => {
                let left_id = sibling_id(ctx.left, "left sibling");
                self.merge_inner(left_id, inner_id, parent_id(ctx), ctx.parent_slot - 1);
                Fixup::merged()
            }
            Rebalance::MergeWithRight => {
                let right_id = sibling_id(ctx.right, "right sibling");
                self.merge_inner(inner_id, right_id, parent_id(ctx), ctx.parent_slot);
                Fixup::merged()
            }
            Rebalance::ShiftFromLeft => {
                let left_id = sibling_id(ctx.left, "left sibling");
                self.shift_right_inner(left_id, inner_id, parent_id(ctx), ctx.parent_slot - 1);
                Fixup::default()
            }
            Rebalance::ShiftFromRight => {
                let right_id = sibling_id(ctx.right, "right sibling");
                self.shift_left_inner(inner_id, right_id, parent_id(ctx), ctx.parent_slot);
                Fixup::default()
            }
        }
    }

    /// Pull the separator down from the parent and append all of `right_id`
    /// to `left_id`. The drained node is freed by its parent.
    fn merge_inner(&mut self, left_id: NodeId, right_id: NodeId, parent: NodeId, parent_slot: usize) {
        let separator = self.inner(parent).keys[parent_slot].clone();
        let right = self.inner_mut(right_id);
        let keys = std::mem::take(&mut right.keys);
        let children = std::mem::take(&mut right.children);

        let left = self.inner_mut(left_id);
        left.keys.push(separator);
        left.keys.extend(keys);
        left.children.extend(children);
        trace_log!(left = left_id, right = right_id, "merged inner nodes");
    }

    /// Rotate the first children of `right_id` through the parent into
    /// `left_id`.
    fn shift_left_inner(&mut self, left_id: NodeId, right_id: NodeId, parent: NodeId, parent_slot: usize) {
        let left_len = self.inner(left_id).len();
        let right = self.inner_mut(right_id);
        let count = (right.len() - left_len) / 2;
        let mut keys: Vec<K> = right.keys.drain(..count).collect();
        let children: Vec<NodeRef> = right.children.drain(..count).collect();

        let Some(new_separator) = keys.pop() else {
            return;
        };
        let old_separator = std::mem::replace(&mut self.inner_mut(parent).keys[parent_slot], new_separator);

        let left = self.inner_mut(left_id);
        left.keys.push(old_separator);
        left.keys.extend(keys);
        left.children.extend(children);
        trace_log!(from = right_id, to = left_id, count, "shifted children left");
    }

    /// Rotate the last children of `left_id` through the parent into
    /// `right_id`.
    fn shift_right_inner(&mut self, left_id: NodeId, right_id: NodeId, parent: NodeId, parent_slot: usize) {
        let right_len = self.inner(right_id).len();
        let left = self.inner_mut(left_id);
        let left_len = left.len();
        let count = (left_len - right_len) / 2;
        if count == 0 {
            return;
        }
        let mut keys = left.keys.split_off(left_len - count);
        let children = left.children.split_off(left_len - count + 1);

        let new_separator = keys.remove(0);
        let old_separator = std::mem::replace(&mut self.inner_mut(parent).keys[parent_slot], new_separator);
        keys.push(old_separator);

        let right = self.inner_mut(right_id);
        right.keys.splice(0..0, keys);
        right.children.splice(0..0, children);
        trace_log!(from = left_id, to = right_id, count, "shifted children right");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AccountingAllocator;
    use crate::config::TreeConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    fn load(len: usize, few: bool) -> Option<SiblingLoad> {
        Some(SiblingLoad { len, few })
    }

    fn ctx(left_parent: Option<NodeId>, right_parent: Option<NodeId>) -> Siblings {
        Siblings {
            left: left_parent.map(|_| NodeRef::Leaf(10)),
            right: right_parent.map(|_| NodeRef::Leaf(11)),
            left_parent,
            right_parent,
            parent: Some(1),
            parent_slot: 1,
        }
    }

    #[test]
    fn test_plan_root_collapses() {
        assert_eq!(plan_rebalance(&Siblings::default(), None, None), Rebalance::CollapseRoot);
    }

    #[test]
    fn test_plan_merges_when_both_siblings_are_few() {
        let shared = ctx(Some(1), Some(1));
        assert_eq!(plan_rebalance(&shared, load(2, true), load(2, true)), Rebalance::MergeWithLeft);

        let cousin_left = ctx(Some(7), Some(1));
        assert_eq!(plan_rebalance(&cousin_left, load(2, true), load(2, true)), Rebalance::MergeWithRight);

        let leftmost = ctx(None, Some(1));
        assert_eq!(plan_rebalance(&leftmost, None, load(2, true)), Rebalance::MergeWithRight);
    }

    #[test]
    fn test_plan_borrows_from_sibling_that_can_spare() {
        let shared = ctx(Some(1), Some(1));
        assert_eq!(plan_rebalance(&shared, load(2, true), load(4, false)), Rebalance::ShiftFromRight);
        assert_eq!(plan_rebalance(&shared, load(4, false), load(2, true)), Rebalance::ShiftFromLeft);

        let cousin_right = ctx(Some(1), Some(9));
        assert_eq!(plan_rebalance(&cousin_right, load(2, true), load(4, false)), Rebalance::MergeWithLeft);

        let cousin_left = ctx(Some(7), Some(1));
        assert_eq!(plan_rebalance(&cousin_left, load(4, false), load(2, true)), Rebalance::MergeWithRight);
    }

    #[test]
    fn test_plan_prefers_fuller_sibling() {
        let shared = ctx(Some(1), Some(1));
        assert_eq!(plan_rebalance(&shared, load(3, false), load(4, false)), Rebalance::ShiftFromRight);
        assert_eq!(plan_rebalance(&shared, load(4, false), load(4, false)), Rebalance::ShiftFromRight);
        assert_eq!(plan_rebalance(&shared, load(5, false), load(3, false)), Rebalance::ShiftFromLeft);

        let cousin_right = ctx(Some(1), Some(9));
        assert_eq!(plan_rebalance(&cousin_right, load(3, false), load(4, false)), Rebalance::ShiftFromLeft);
        let rightmost = ctx(Some(1), None);
        assert_eq!(plan_rebalance(&rightmost, load(3, false), None), Rebalance::ShiftFromLeft);
        let leftmost = ctx(None, Some(1));
        assert_eq!(plan_rebalance(&leftmost, None, load(3, false)), Rebalance::ShiftFromRight);
    }

    #[test]
    fn test_erase_missing_key_is_noop() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        assert!(!tree.erase_by_key(&1));
        for i in (0..40).step_by(2) {
            tree.insert(i, i);
        }
        assert!(!tree.erase_by_key(&5));
        assert!(!tree.erase_by_key(&100));
        assert_eq!(tree.len(), 20);
        tree.verify();
    }

    #[test]
    fn test_erase_everything_ascending_and_descending() {
        for descending in [false, true] {
            let mut tree = BPlusTreeMap::new(4).unwrap();
            for i in 0..300 {
                tree.insert(i, i);
            }
            let order: Vec<i32> = if descending {
                (0..300).rev().collect()
            } else {
                (0..300).collect()
            };
            for (erased, key) in order.iter().enumerate() {
                assert_eq!(tree.remove(key), Some(*key));
                assert_eq!(tree.len(), 300 - erased - 1);
                tree.verify();
            }
            assert!(tree.root().is_none());
            assert_eq!(tree.begin(), tree.end());
            assert_eq!(tree.get_stats().nodes(), 0);
        }
    }

    #[test]
    fn test_erase_from_middle_collapses_root() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for i in 0..64 {
            tree.insert(i, ());
        }
        let tall = tree.height();
        for i in (0..64).filter(|i| i % 8 != 0) {
            assert!(tree.erase_by_key(&i));
            tree.verify();
        }
        assert!(tree.height() < tall);
        assert_eq!(tree.keys().copied().collect::<Vec<_>>(), [0, 8, 16, 24, 32, 40, 48, 56]);
    }

    #[test]
    fn test_erase_last_key_of_leaf_updates_separator() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        for i in 1..=8 {
            tree.insert(i * 10, ());
        }
        let root_separator = |tree: &BPlusTreeMap<i32, ()>| match tree.root() {
            Some(NodeRef::Inner(id)) => tree.get_inner(id).unwrap().keys()[0],
            other => panic!("expected an inner root, got {:?}", other),
        };
        let separator = root_separator(&tree);
        assert!(tree.erase_by_key(&separator));
        tree.verify();
        assert_ne!(root_separator(&tree), separator);
    }

    #[test]
    fn test_erase_by_position_removes_exact_duplicate() {
        let mut tree = BPlusTreeMap::multimap(4).unwrap();
        for value in 0..12 {
            tree.insert(5, value);
        }
        tree.insert(1, 100);
        tree.insert(9, 900);

        let (first, last) = tree.equal_range(&5);
        let mut pos = first;
        for _ in 0..7 {
            pos = tree.next_position(pos);
        }
        assert_ne!(pos, last);
        assert_eq!(tree.value_at(pos), Some(&4));
        assert!(tree.erase_by_position(pos));
        tree.verify();

        let remaining: Vec<i32> = tree.range(5..=5).map(|(_, v)| *v).collect();
        assert_eq!(remaining, [11, 10, 9, 8, 7, 6, 5, 3, 2, 1, 0]);
    }

    #[test]
    fn test_erase_by_invalid_position() {
        let mut tree = BPlusTreeMap::new(4).unwrap();
        assert!(!tree.erase_by_position(tree.begin()));
        tree.insert(1, 1);
        assert!(!tree.erase_by_position(tree.end()));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_erase_all_duplicates() {
        let mut tree = BPlusTreeMap::multimap(4).unwrap();
        for i in 0..10 {
            tree.insert(i % 3, i);
        }
        assert_eq!(tree.erase_all(&1), 3);
        assert_eq!(tree.count(&1), 0);
        assert_eq!(tree.len(), 7);
        tree.verify();
    }

    #[test]
    fn test_erase_releases_nodes_through_allocator() {
        let mut tree =
            BPlusTreeMap::with_config_and_allocator(TreeConfig::with_capacity(4), AccountingAllocator::new())
                .unwrap();
        for i in 0..100u32 {
            tree.insert(i, i);
        }
        for i in 0..100u32 {
            tree.erase_by_key(&i);
        }
        assert_eq!(tree.allocator().live_nodes(), 0);
        assert!(tree.allocator().released > 0);
    }

    #[test]
    fn test_erase_by_position_in_tall_multimap_keeps_separators() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tree = BPlusTreeMap::multimap(4).unwrap();
        for op in 0..4000u32 {
            let grow = if op < 2000 { 6 } else { 4 };
            if tree.is_empty() || rng.gen_range(0..10) < grow {
                tree.insert(rng.gen_range(0..16u8), op);
            } else {
                let index = rng.gen_range(0..tree.len());
                let mut pos = tree.begin();
                for _ in 0..index {
                    pos = tree.next_position(pos);
                }
                assert!(tree.erase_by_position(pos));
            }
            if let Err(violation) = tree.check_invariants_detailed() {
                panic!("op {} (len {}, height {}): {}", op, tree.len(), tree.height(), violation);
            }
        }
    }

    #[test]
    fn test_erase_matches_model_through_inner_rebalancing() {
        for seed in 0..4 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut tree = BPlusTreeMap::new(4).unwrap();
            let mut model = BTreeMap::new();
            for op in 0..3000u32 {
                let key = rng.gen_range(0..400u32);
                match rng.gen_range(0..4) {
                    0 | 1 => {
                        tree.insert(key, op);
                        model.entry(key).or_insert(op);
                    }
                    2 => assert_eq!(tree.erase_by_key(&key), model.remove(&key).is_some()),
                    _ => assert_eq!(tree.remove(&key), model.remove(&key)),
                }
                if let Err(violation) = tree.check_invariants_detailed() {
                    panic!("seed {} op {}: {}", seed, op, violation);
                }
                if op % 50 == 0 {
                    for lookup in 0..400 {
                        assert_eq!(
                            tree.get(&lookup),
                            model.get(&lookup),
                            "seed {} op {} key {}",
                            seed,
                            op,
                            lookup
                        );
                    }
                }
            }
        }
    }
}
