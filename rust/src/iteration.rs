//! Positions and iterators for BPlusTreeMap.
//!
//! A [`Position`] addresses one slot of one leaf. Walking the leaf chain
//! through positions gives forward and reverse iteration without touching
//! inner nodes. Positions are invalidated by any mutation of the tree.

use std::iter::FusedIterator;

use crate::allocator::{NodeAllocator, VolatileAllocator};
use crate::types::{BPlusTreeMap, NodeId, NULL_NODE};

// ============================================================================
// POSITIONS
// ============================================================================

/// Address of an entry: a leaf and a slot within it.
///
/// The past-the-end position of a non-empty tree is the last leaf with a slot
/// equal to its length. Both `begin()` and `end()` of an empty tree are the
/// null position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    leaf: NodeId,
    slot: usize,
}

impl Position {
    pub(crate) fn new(leaf: NodeId, slot: usize) -> Self {
        Self { leaf, slot }
    }

    pub(crate) fn null() -> Self {
        Self::new(NULL_NODE, 0)
    }

    /// Leaf this position points into.
    pub fn leaf(&self) -> NodeId {
        self.leaf
    }

    /// Slot within the leaf.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Position for walking the tree backwards.
///
/// Wraps the forward position one past the entry it refers to, so
/// `rbegin()` wraps `end()` and `rend()` wraps `begin()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReversePosition(Position);

impl ReversePosition {
    /// The forward position one past the referenced entry.
    pub fn base(&self) -> Position {
        self.0
    }
}

// ============================================================================
// POSITION NAVIGATION
// ============================================================================

impl<K, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Position of the smallest entry, or `end()` for an empty tree.
    pub fn begin(&self) -> Position {
        if self.head_leaf == NULL_NODE {
            Position::null()
        } else {
            Position::new(self.head_leaf, 0)
        }
    }

    /// Past-the-end position.
    pub fn end(&self) -> Position {
        match self.leaf_arena.get(self.tail_leaf) {
            Some(tail) => Position::new(self.tail_leaf, tail.len()),
            None => Position::null(),
        }
    }

    /// Reverse position of the largest entry.
    pub fn rbegin(&self) -> ReversePosition {
        ReversePosition(self.end())
    }

    /// Reverse past-the-end position.
    pub fn rend(&self) -> ReversePosition {
        ReversePosition(self.begin())
    }

    /// Position after `position`. Stays at `end()` once there.
    pub fn next_position(&self, position: Position) -> Position {
        let Some(leaf) = self.leaf_arena.get(position.leaf) else {
            return position;
        };
        if position.slot + 1 < leaf.len() {
            Position::new(position.leaf, position.slot + 1)
        } else if leaf.next != NULL_NODE {
            Position::new(leaf.next, 0)
        } else {
            Position::new(position.leaf, leaf.len())
        }
    }

    /// Position before `position`. Stays at `begin()` once there.
    pub fn prev_position(&self, position: Position) -> Position {
        let Some(leaf) = self.leaf_arena.get(position.leaf) else {
            return position;
        };
        if position.slot > 0 {
            return Position::new(position.leaf, position.slot - 1);
        }
        match self.leaf_arena.get(leaf.prev) {
            Some(prev) => Position::new(leaf.prev, prev.len() - 1),
            None => position,
        }
    }

    /// Reverse position after `position`, towards smaller keys.
    pub fn next_reverse(&self, position: ReversePosition) -> ReversePosition {
        let ReversePosition(base) = position;
        let Some(leaf) = self.leaf_arena.get(base.leaf) else {
            return position;
        };
        if base.slot > 1 {
            return ReversePosition(Position::new(base.leaf, base.slot - 1));
        }
        match (base.slot, self.leaf_arena.get(leaf.prev)) {
            (1, Some(prev)) => ReversePosition(Position::new(leaf.prev, prev.len())),
            (_, Some(prev)) => ReversePosition(Position::new(leaf.prev, prev.len() - 1)),
            (_, None) => ReversePosition(Position::new(base.leaf, 0)),
        }
    }

    /// Reverse position before `position`, towards larger keys.
    pub fn prev_reverse(&self, position: ReversePosition) -> ReversePosition {
        let ReversePosition(base) = position;
        let Some(leaf) = self.leaf_arena.get(base.leaf) else {
            return position;
        };
        if base.slot < leaf.len() {
            ReversePosition(Position::new(base.leaf, base.slot + 1))
        } else if leaf.next != NULL_NODE {
            ReversePosition(Position::new(leaf.next, 1))
        } else {
            position
        }
    }

    /// Key at `position`, or `None` if it does not address an entry.
    pub fn key_at(&self, position: Position) -> Option<&K> {
        self.leaf_arena.get(position.leaf)?.keys.get(position.slot)
    }

    /// Value at `position`, or `None` if it does not address an entry.
    pub fn value_at(&self, position: Position) -> Option<&V> {
        self.leaf_arena.get(position.leaf)?.values.get(position.slot)
    }

    /// Mutable value at `position`. Keys can never be modified in place.
    pub fn value_at_mut(&mut self, position: Position) -> Option<&mut V> {
        self.leaf_arena.get_mut(position.leaf)?.values.get_mut(position.slot)
    }

    /// Entry at `position`.
    pub fn entry_at(&self, position: Position) -> Option<(&K, &V)> {
        let leaf = self.leaf_arena.get(position.leaf)?;
        Some((leaf.keys.get(position.slot)?, leaf.values.get(position.slot)?))
    }

    /// Entry referenced by a reverse position.
    pub fn entry_at_reverse(&self, position: ReversePosition) -> Option<(&K, &V)> {
        let ReversePosition(base) = position;
        match base.slot.checked_sub(1) {
            Some(slot) => self.entry_at(Position::new(base.leaf, slot)),
            None => {
                let prev = self.leaf_arena.get(base.leaf)?.prev;
                self.entry_at(Position::new(prev, self.leaf_arena.get(prev)?.len().checked_sub(1)?))
            }
        }
    }

    /// Move a slot-past-the-leaf position to the start of the next leaf.
    pub(crate) fn normalize(&self, position: Position) -> Position {
        match self.leaf_arena.get(position.leaf) {
            Some(leaf) if position.slot >= leaf.len() && leaf.next != NULL_NODE => {
                Position::new(leaf.next, 0)
            }
            _ => position,
        }
    }

    // ============================================================================
    // ITERATOR CONSTRUCTORS
    // ============================================================================

    /// Returns an iterator over all key-value pairs in sorted order.
    pub fn items(&self) -> ItemIterator<'_, K, V, A> {
        ItemIterator::new(self, self.begin(), self.end())
    }

    /// Alias for [`items`](Self::items).
    pub fn iter(&self) -> ItemIterator<'_, K, V, A> {
        self.items()
    }

    /// Returns an iterator over all key-value pairs in descending order.
    pub fn items_rev(&self) -> std::iter::Rev<ItemIterator<'_, K, V, A>> {
        self.items().rev()
    }

    /// Returns an iterator over all keys in sorted order.
    pub fn keys(&self) -> KeyIterator<'_, K, V, A> {
        KeyIterator {
            items: self.items(),
        }
    }

    /// Returns an iterator over all values in key order.
    pub fn values(&self) -> ValueIterator<'_, K, V, A> {
        ValueIterator {
            items: self.items(),
        }
    }

    /// Iterate from `position` to the end.
    pub fn iter_from(&self, position: Position) -> ItemIterator<'_, K, V, A> {
        ItemIterator::new(self, position, self.end())
    }
}

// ============================================================================
// ITERATOR STRUCTS
// ============================================================================

/// Iterator over key-value pairs between two positions of the leaf chain.
pub struct ItemIterator<'a, K, V, A: NodeAllocator = VolatileAllocator> {
    tree: &'a BPlusTreeMap<K, V, A>,
    front: Position,
    back: Position,
}

/// Iterator over keys in the B+ tree.
pub struct KeyIterator<'a, K, V, A: NodeAllocator = VolatileAllocator> {
    items: ItemIterator<'a, K, V, A>,
}

/// Iterator over values in the B+ tree.
pub struct ValueIterator<'a, K, V, A: NodeAllocator = VolatileAllocator> {
    items: ItemIterator<'a, K, V, A>,
}

impl<'a, K, V, A: NodeAllocator> ItemIterator<'a, K, V, A> {
    pub(crate) fn new(tree: &'a BPlusTreeMap<K, V, A>, front: Position, back: Position) -> Self {
        Self {
            tree,
            front: tree.normalize(front),
            back: tree.normalize(back),
        }
    }

    /// Position of the next entry yielded from the front.
    pub fn position(&self) -> Position {
        self.front
    }
}

impl<'a, K, V, A: NodeAllocator> Iterator for ItemIterator<'a, K, V, A> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let tree = self.tree;
        let entry = tree.entry_at(self.front)?;
        self.front = tree.next_position(self.front);
        Some(entry)
    }
}

impl<'a, K, V, A: NodeAllocator> DoubleEndedIterator for ItemIterator<'a, K, V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let tree = self.tree;
        self.back = tree.prev_position(self.back);
        tree.entry_at(self.back)
    }
}

impl<'a, K, V, A: NodeAllocator> FusedIterator for ItemIterator<'a, K, V, A> {}

impl<'a, K, V, A: NodeAllocator> Iterator for KeyIterator<'a, K, V, A> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(|(k, _)| k)
    }
}

impl<'a, K, V, A: NodeAllocator> DoubleEndedIterator for KeyIterator<'a, K, V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.items.next_back().map(|(k, _)| k)
    }
}

impl<'a, K, V, A: NodeAllocator> Iterator for ValueIterator<'a, K, V, A> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(|(_, v)| v)
    }
}

impl<'a, K, V, A: NodeAllocator> DoubleEndedIterator for ValueIterator<'a, K, V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.items.next_back().map(|(_, v)| v)
    }
}

impl<'a, K, V, A: NodeAllocator> IntoIterator for &'a BPlusTreeMap<K, V, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = ItemIterator<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.items()
    }
}
