//! Range query operations for BPlusTreeMap.
//!
//! Range bounds are resolved to a pair of leaf positions with
//! `lower_bound`/`upper_bound`, then walked along the leaf chain.

use std::ops::{Bound, RangeBounds};

use crate::allocator::NodeAllocator;
use crate::iteration::{ItemIterator, Position};
use crate::search::key_greater;
use crate::types::BPlusTreeMap;

// ============================================================================
// RANGE QUERY OPERATIONS
// ============================================================================

impl<K: Ord, V, A: NodeAllocator> BPlusTreeMap<K, V, A> {
    /// Returns an iterator over key-value pairs in a range using Rust's range syntax.
    ///
    /// A range whose start lies after its end is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(4).unwrap();
    /// for i in 0..10 {
    ///     tree.insert(i, i * 10);
    /// }
    ///
    /// let half_open: Vec<_> = tree.range(3..7).map(|(k, _)| *k).collect();
    /// assert_eq!(half_open, [3, 4, 5, 6]);
    ///
    /// let closed: Vec<_> = tree.range(3..=7).map(|(k, _)| *k).collect();
    /// assert_eq!(closed, [3, 4, 5, 6, 7]);
    ///
    /// let tail: Vec<_> = tree.range(8..).map(|(_, v)| *v).collect();
    /// assert_eq!(tail, [80, 90]);
    ///
    /// assert_eq!(tree.range(..).count(), 10);
    /// ```
    pub fn range<R>(&self, range: R) -> ItemIterator<'_, K, V, A>
    where
        R: RangeBounds<K>,
    {
        let (front, back) = self.resolve_range_bounds(&range);
        ItemIterator::new(self, front, back)
    }

    /// Resolve `range` to `[front, back)` positions.
    fn resolve_range_bounds<R>(&self, range: &R) -> (Position, Position)
    where
        R: RangeBounds<K>,
    {
        if Self::is_inverted(range) {
            let end = self.end();
            return (end, end);
        }

        let front = match range.start_bound() {
            Bound::Included(key) => self.lower_bound(key),
            Bound::Excluded(key) => self.upper_bound(key),
            Bound::Unbounded => self.begin(),
        };
        let back = match range.end_bound() {
            Bound::Included(key) => self.upper_bound(key),
            Bound::Excluded(key) => self.lower_bound(key),
            Bound::Unbounded => self.end(),
        };
        (front, back)
    }

    fn is_inverted<R: RangeBounds<K>>(range: &R) -> bool {
        match (range.start_bound(), range.end_bound()) {
            (Bound::Included(start), Bound::Included(end)) => key_greater(start, end),
            (Bound::Included(start), Bound::Excluded(end))
            | (Bound::Excluded(start), Bound::Included(end))
            | (Bound::Excluded(start), Bound::Excluded(end)) => !key_greater(end, start),
            _ => false,
        }
    }
}
