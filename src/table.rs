//! BucketTable: a fixed power-of-two array of chain heads.
//!
//! The table stores arena keys only. Every operation that follows a chain
//! takes the arena that owns the nodes, so the two tables of a map can
//! share one arena and hand nodes to each other by relinking keys.

use crate::node::{Arena, Node};
use slotmap::DefaultKey;

/// The slot that points at a node: a bucket head or a predecessor's `next`.
///
/// Returned by `lookup` so the caller can unlink the match without
/// walking the chain a second time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Link {
    Head(usize),
    Next(DefaultKey),
}

#[derive(Debug, Default)]
pub(crate) struct BucketTable {
    buckets: Box<[Option<DefaultKey>]>,
    mask: usize,
    size: usize,
}

impl BucketTable {
    /// The unallocated table: no buckets, mask 0.
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Allocate `capacity` empty buckets.
    ///
    /// Panics unless `capacity` is a non-zero power of two; callers only
    /// ever pass validated or doubled capacities.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity.is_power_of_two(),
            "table capacity must be a non-zero power of two, got {capacity}"
        );
        Self {
            buckets: vec![None; capacity].into_boxed_slice(),
            mask: capacity - 1,
            size: 0,
        }
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    /// Push `key` onto the head of its bucket. O(1), no deduplication.
    pub(crate) fn insert<T>(&mut self, arena: &mut Arena<T>, key: DefaultKey) {
        assert!(self.is_allocated(), "insert into an unallocated table");
        let pos = self.bucket_of(arena[key].node.hash_code());
        let slot = &mut arena[key];
        debug_assert!(slot.next.is_none(), "node is still linked elsewhere");
        slot.next = self.buckets[pos];
        self.buckets[pos] = Some(key);
        self.size += 1;
    }

    /// Walk the chain for `hash` and return the link to the first node
    /// accepted by `pred`.
    fn position<T, F>(&self, arena: &Arena<T>, hash: u64, mut pred: F) -> Option<Link>
    where
        F: FnMut(DefaultKey, &Node<T>) -> bool,
    {
        if !self.is_allocated() {
            return None;
        }
        let pos = self.bucket_of(hash);
        let mut link = Link::Head(pos);
        let mut cur = self.buckets[pos];
        while let Some(k) = cur {
            let slot = &arena[k];
            if pred(k, &slot.node) {
                return Some(link);
            }
            link = Link::Next(k);
            cur = slot.next;
        }
        None
    }

    /// Find a node whose hash code equals `hash` and whose payload satisfies
    /// `eq`. `eq` only runs on hash matches.
    pub(crate) fn lookup<T, F>(&self, arena: &Arena<T>, hash: u64, mut eq: F) -> Option<Link>
    where
        F: FnMut(&T) -> bool,
    {
        self.position(arena, hash, |_, n| n.hash_code() == hash && eq(n.payload()))
    }

    /// Find the link to a specific arena key, if this table owns it.
    pub(crate) fn locate<T>(&self, arena: &Arena<T>, key: DefaultKey) -> Option<Link> {
        let hash = arena.get(key)?.node.hash_code();
        self.position(arena, hash, |k, _| k == key)
    }

    /// The key a link currently points at.
    pub(crate) fn target<T>(&self, arena: &Arena<T>, link: Link) -> Option<DefaultKey> {
        match link {
            Link::Head(pos) => self.buckets.get(pos).copied().flatten(),
            Link::Next(prev) => arena.get(prev).and_then(|s| s.next),
        }
    }

    /// Splice the node behind `link` out of its chain. The node stays in the
    /// arena, unlinked; its key is returned.
    ///
    /// `link` must come from this table's own `lookup`/`locate`.
    pub(crate) fn detach<T>(&mut self, arena: &mut Arena<T>, link: Link) -> Option<DefaultKey> {
        let key = self.target(arena, link)?;
        let next = arena[key].next.take();
        match link {
            Link::Head(pos) => self.buckets[pos] = next,
            Link::Next(prev) => arena[prev].next = next,
        }
        self.size -= 1;
        Some(key)
    }

    /// Detach the head of bucket `pos`, or `None` if the bucket is empty or
    /// out of range.
    pub(crate) fn pop_head<T>(&mut self, arena: &mut Arena<T>, pos: usize) -> Option<DefaultKey> {
        if pos >= self.capacity() {
            return None;
        }
        self.detach(arena, Link::Head(pos))
    }

    /// Nodes in bucket-index order, chain order within a bucket.
    pub(crate) fn chains<'a, T>(&'a self, arena: &'a Arena<T>) -> Chains<'a, T> {
        Chains {
            arena,
            buckets: self.buckets.iter(),
            cur: None,
        }
    }

    /// Visit every node. The visitor sees shared references only, so it
    /// cannot relink the chains being walked.
    pub(crate) fn scan<T, F>(&self, arena: &Arena<T>, mut visit: F)
    where
        F: FnMut(DefaultKey, &Node<T>),
    {
        if self.is_empty() {
            return;
        }
        for (k, n) in self.chains(arena) {
            visit(k, n);
        }
    }

    /// Check capacity, mask, placement and size against a full walk.
    #[cfg(test)]
    pub(crate) fn assert_invariants<T>(&self, arena: &Arena<T>) {
        if !self.is_allocated() {
            assert_eq!(self.mask, 0);
            assert_eq!(self.size, 0);
            return;
        }
        assert!(self.capacity().is_power_of_two());
        assert_eq!(self.mask, self.capacity() - 1);
        let mut count = 0;
        for (pos, head) in self.buckets.iter().enumerate() {
            let mut cur = *head;
            while let Some(k) = cur {
                let slot = &arena[k];
                assert_eq!(self.bucket_of(slot.node.hash_code()), pos, "misplaced node");
                count += 1;
                cur = slot.next;
            }
        }
        assert_eq!(count, self.size, "size counter out of sync with chains");
    }
}

pub(crate) struct Chains<'a, T> {
    arena: &'a Arena<T>,
    buckets: core::slice::Iter<'a, Option<DefaultKey>>,
    cur: Option<DefaultKey>,
}

impl<'a, T> Iterator for Chains<'a, T> {
    type Item = (DefaultKey, &'a Node<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let arena: &'a Arena<T> = self.arena;
        loop {
            if let Some(k) = self.cur {
                let slot = &arena[k];
                self.cur = slot.next;
                return Some((k, &slot.node));
            }
            self.cur = *self.buckets.next()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Linked;

    fn add(
        arena: &mut Arena<&'static str>,
        t: &mut BucketTable,
        hash: u64,
        v: &'static str,
    ) -> DefaultKey {
        let k = arena.insert(Linked::unlinked(Node::new(hash, v)));
        t.insert(arena, k);
        k
    }

    /// Invariant: capacity is a power of two and mask is capacity - 1.
    #[test]
    fn with_capacity_sets_mask() {
        for cap in [1usize, 2, 4, 64, 1024] {
            let t = BucketTable::with_capacity(cap);
            assert_eq!(t.capacity(), cap);
            assert_eq!(t.mask, cap - 1);
            assert!(t.is_empty());
        }
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn zero_capacity_panics() {
        let _ = BucketTable::with_capacity(0);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn non_power_of_two_panics() {
        let _ = BucketTable::with_capacity(12);
    }

    /// Invariant: an unallocated table answers every probe with "not found".
    #[test]
    fn empty_table_lookup_is_none() {
        let arena: Arena<&str> = Arena::with_key();
        let t = BucketTable::empty();
        assert!(!t.is_allocated());
        assert_eq!(t.capacity(), 0);
        assert!(t.lookup(&arena, 7, |_| true).is_none());
        t.assert_invariants(&arena);
    }

    /// Invariant: nodes land in `buckets[hash & mask]`, newest first.
    #[test]
    fn insert_pushes_at_head_of_bucket() {
        let mut arena = Arena::with_key();
        let mut t = BucketTable::with_capacity(4);
        let a = add(&mut arena, &mut t, 1, "a");
        let b = add(&mut arena, &mut t, 5, "b");
        let c = add(&mut arena, &mut t, 2, "c");
        assert_eq!(t.len(), 3);
        assert_eq!(t.target(&arena, Link::Head(1)), Some(b));
        assert_eq!(t.target(&arena, Link::Next(b)), Some(a));
        assert_eq!(t.target(&arena, Link::Head(2)), Some(c));
        t.assert_invariants(&arena);
    }

    /// Invariant: equality only runs on hash matches, and a miss in a
    /// populated chain is reported as absent.
    #[test]
    fn lookup_compares_hash_before_eq() {
        let mut arena = Arena::with_key();
        let mut t = BucketTable::with_capacity(4);
        add(&mut arena, &mut t, 1, "a");
        add(&mut arena, &mut t, 5, "b");
        let mut calls = 0;
        let link = t.lookup(&arena, 1, |v| {
            calls += 1;
            *v == "a"
        });
        assert_eq!(calls, 1);
        assert!(matches!(link, Some(Link::Next(_))));
        assert!(t.lookup(&arena, 9, |_| true).is_none());
        assert!(t.lookup(&arena, 5, |v| *v == "zzz").is_none());
    }

    /// Invariant: duplicates are kept; the table does not deduplicate.
    #[test]
    fn duplicates_are_not_merged() {
        let mut arena = Arena::with_key();
        let mut t = BucketTable::with_capacity(2);
        add(&mut arena, &mut t, 3, "k");
        add(&mut arena, &mut t, 3, "k");
        assert_eq!(t.len(), 2);
        let mut seen = 0;
        t.scan(&arena, |_, n| {
            assert_eq!(*n.payload(), "k");
            seen += 1;
        });
        assert_eq!(seen, 2);
    }

    /// Invariant: detach through a head or interior link splices the node
    /// out, keeps the rest of the chain and decrements size.
    #[test]
    fn detach_head_and_interior() {
        let mut arena = Arena::with_key();
        let mut t = BucketTable::with_capacity(4);
        let a = add(&mut arena, &mut t, 0, "a");
        let b = add(&mut arena, &mut t, 4, "b");
        let c = add(&mut arena, &mut t, 8, "c");

        let link = t.lookup(&arena, 4, |v| *v == "b").unwrap();
        assert_eq!(link, Link::Next(c));
        assert_eq!(t.detach(&mut arena, link), Some(b));
        assert!(arena[b].next.is_none());
        assert_eq!(t.len(), 2);
        t.assert_invariants(&arena);

        let link = t.lookup(&arena, 8, |v| *v == "c").unwrap();
        assert_eq!(link, Link::Head(0));
        assert_eq!(t.detach(&mut arena, link), Some(c));
        assert_eq!(t.target(&arena, Link::Head(0)), Some(a));
        assert_eq!(t.len(), 1);
        t.assert_invariants(&arena);
    }

    #[test]
    fn pop_head_bounds_and_occupancy() {
        let mut arena = Arena::with_key();
        let mut t = BucketTable::with_capacity(2);
        let a = add(&mut arena, &mut t, 1, "a");
        assert_eq!(t.pop_head(&mut arena, 0), None);
        assert_eq!(t.pop_head(&mut arena, 2), None);
        assert_eq!(t.pop_head(&mut arena, 1), Some(a));
        assert_eq!(t.pop_head(&mut arena, 1), None);
        assert!(t.is_empty());
    }

    #[test]
    fn locate_finds_specific_key_among_equal_hashes() {
        let mut arena = Arena::with_key();
        let mut t = BucketTable::with_capacity(4);
        let a = add(&mut arena, &mut t, 2, "a");
        let b = add(&mut arena, &mut t, 2, "b");
        assert_eq!(t.locate(&arena, a), Some(Link::Next(b)));
        assert_eq!(t.locate(&arena, b), Some(Link::Head(2)));

        let other = BucketTable::with_capacity(4);
        assert_eq!(other.locate(&arena, a), None);
    }

    /// Invariant: scan walks buckets in index order, chains head first.
    #[test]
    fn scan_order() {
        let mut arena = Arena::with_key();
        let mut t = BucketTable::with_capacity(4);
        add(&mut arena, &mut t, 3, "d");
        add(&mut arena, &mut t, 0, "a");
        add(&mut arena, &mut t, 4, "b");
        add(&mut arena, &mut t, 1, "c");
        let mut order = Vec::new();
        t.scan(&arena, |_, n| order.push(*n.payload()));
        assert_eq!(order, ["b", "a", "c", "d"]);
        let via_iter: Vec<_> = t.chains(&arena).map(|(_, n)| *n.payload()).collect();
        assert_eq!(order, via_iter);
    }
}
