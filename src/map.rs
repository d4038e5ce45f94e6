//! ProgressiveMap: a chained hash table that grows without stop-the-world
//! rehashing.
//!
//! While a resize is running the map holds two tables. `primary` receives
//! every insert; `secondary` is the overloaded table being drained. Each
//! public operation first moves a bounded number of nodes from `secondary`
//! to `primary`, so no single call pays for rehashing the whole key space.

use crate::config::Config;
use crate::error::ConfigError;
use crate::node::{Arena, Linked, Node};
use crate::table::{BucketTable, Chains};
use slotmap::DefaultKey;
use tracing::{debug, trace};

/// Empty buckets a single help step may skip, per unit of `resize_work`.
const EMPTY_VISITS_PER_WORK: usize = 10;

/// Stable identifier of a node stored in a `ProgressiveMap`.
///
/// Handles survive migration between tables. A handle to a popped node never
/// resolves again, even if its arena slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn node<'a, T>(&self, map: &'a ProgressiveMap<T>) -> Option<&'a Node<T>> {
        map.get(*self)
    }

    pub fn payload<'a, T>(&self, map: &'a ProgressiveMap<T>) -> Option<&'a T> {
        map.get(*self).map(Node::payload)
    }

    pub fn payload_mut<'a, T>(&self, map: &'a mut ProgressiveMap<T>) -> Option<&'a mut T> {
        map.get_mut(*self)
    }
}

pub struct ProgressiveMap<T> {
    nodes: Arena<T>,
    primary: BucketTable,
    secondary: Option<BucketTable>,
    resize_cursor: usize,
    config: Config,
}

impl<T> ProgressiveMap<T> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Build a map with explicit tunables.
    ///
    /// Panics if `config` does not validate; use `try_with_config` when the
    /// values come from outside the program.
    pub fn with_config(config: Config) -> Self {
        match Self::try_with_config(config) {
            Ok(map) => map,
            Err(e) => panic!("invalid map config: {e}"),
        }
    }

    pub fn try_with_config(config: Config) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        Ok(Self {
            nodes: Arena::with_key(),
            primary: BucketTable::empty(),
            secondary: None,
            resize_cursor: 0,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Live nodes across both tables. Does not advance a resize.
    pub fn len(&self) -> usize {
        self.primary.len() + self.secondary.as_ref().map_or(0, BucketTable::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live nodes across both tables, after advancing any running resize.
    pub fn size(&mut self) -> usize {
        self.help_resize();
        self.len()
    }

    /// Count nodes by walking every chain. Always equal to `len()`; kept as
    /// an independent check of the running counters.
    pub fn count_by_scan(&self) -> usize {
        let mut count = 0;
        self.scan(|_| count += 1);
        count
    }

    /// Bucket count of the table receiving inserts (0 before the first
    /// insert).
    pub fn capacity(&self) -> usize {
        self.primary.capacity()
    }

    pub fn is_resizing(&self) -> bool {
        self.secondary.is_some()
    }

    /// Insert `node` and return its handle. No deduplication: callers that
    /// want upsert semantics `pop` the old node first.
    pub fn insert(&mut self, node: Node<T>) -> Handle {
        self.help_resize();
        if !self.primary.is_allocated() {
            self.primary = BucketTable::with_capacity(self.config.initial_capacity);
        }
        let key = self.nodes.insert(Linked::unlinked(node));
        self.primary.insert(&mut self.nodes, key);

        if self.secondary.is_none() && self.overloaded() {
            self.start_resize();
        }
        Handle::new(key)
    }

    fn overloaded(&self) -> bool {
        let limit = self
            .primary
            .capacity()
            .saturating_mul(self.config.max_load_factor);
        self.primary.len() > limit
    }

    /// Retire `primary` as the migration source and allocate a table twice
    /// its size in its place.
    fn start_resize(&mut self) {
        debug_assert!(self.secondary.is_none(), "resize already in progress");
        let capacity = match self.primary.capacity().checked_mul(2) {
            Some(c) => c,
            None => panic!("capacity overflow"),
        };
        let old = std::mem::replace(&mut self.primary, BucketTable::with_capacity(capacity));
        debug!(
            from = old.capacity(),
            to = capacity,
            len = old.len(),
            "starting progressive resize"
        );
        self.secondary = Some(old);
        self.resize_cursor = 0;
    }

    /// Move up to `resize_work` nodes from `secondary` into `primary`, and
    /// release `secondary` once it is empty.
    fn help_resize(&mut self) {
        let Some(old) = self.secondary.as_mut() else {
            return;
        };
        let budget = self.config.resize_work;
        let mut empty_visits = budget.saturating_mul(EMPTY_VISITS_PER_WORK);
        let mut moved = 0;
        while moved < budget && !old.is_empty() && self.resize_cursor < old.capacity() {
            match old.pop_head(&mut self.nodes, self.resize_cursor) {
                Some(key) => {
                    self.primary.insert(&mut self.nodes, key);
                    moved += 1;
                }
                None => {
                    self.resize_cursor += 1;
                    empty_visits -= 1;
                    if empty_visits == 0 {
                        break;
                    }
                }
            }
        }
        trace!(moved, cursor = self.resize_cursor, remaining = old.len(), "resize step");

        if old.is_empty() {
            debug!(capacity = self.primary.capacity(), len = self.primary.len(), "resize finished");
            self.secondary = None;
            self.resize_cursor = 0;
        }
    }

    fn find_key<F>(&self, hash_code: u64, mut eq: F) -> Option<DefaultKey>
    where
        F: FnMut(&T) -> bool,
    {
        if let Some(link) = self.primary.lookup(&self.nodes, hash_code, &mut eq) {
            return self.primary.target(&self.nodes, link);
        }
        let old = self.secondary.as_ref()?;
        let link = old.lookup(&self.nodes, hash_code, &mut eq)?;
        old.target(&self.nodes, link)
    }

    /// Find the node with `hash_code` whose payload satisfies `eq`.
    ///
    /// `primary` is probed before `secondary`, so a node already migrated
    /// always shadows anything left behind.
    pub fn lookup<F>(&mut self, hash_code: u64, eq: F) -> Option<&Node<T>>
    where
        F: FnMut(&T) -> bool,
    {
        self.help_resize();
        let key = self.find_key(hash_code, eq)?;
        self.nodes.get(key).map(|s| &s.node)
    }

    /// Like `lookup`, with mutable access to the payload only. The hash code
    /// decides the bucket, so it never changes while the node is linked.
    pub fn lookup_mut<F>(&mut self, hash_code: u64, eq: F) -> Option<&mut T>
    where
        F: FnMut(&T) -> bool,
    {
        self.help_resize();
        let key = self.find_key(hash_code, eq)?;
        self.nodes.get_mut(key).map(|s| s.node.payload_mut())
    }

    /// Like `lookup`, returning a handle instead of a reference.
    pub fn find<F>(&mut self, hash_code: u64, eq: F) -> Option<Handle>
    where
        F: FnMut(&T) -> bool,
    {
        self.help_resize();
        self.find_key(hash_code, eq).map(Handle::new)
    }

    pub fn contains<F>(&mut self, hash_code: u64, eq: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.find(hash_code, eq).is_some()
    }

    /// Remove the matching node and hand it back to the caller.
    pub fn pop<F>(&mut self, hash_code: u64, mut eq: F) -> Option<Node<T>>
    where
        F: FnMut(&T) -> bool,
    {
        self.help_resize();
        let key = match self.primary.lookup(&self.nodes, hash_code, &mut eq) {
            Some(link) => self.primary.detach(&mut self.nodes, link),
            None => {
                let old = self.secondary.as_mut()?;
                let link = old.lookup(&self.nodes, hash_code, &mut eq)?;
                old.detach(&mut self.nodes, link)
            }
        }?;
        self.nodes.remove(key).map(|s| s.node)
    }

    /// Remove the node behind `handle`, whichever table currently owns it.
    pub fn remove(&mut self, handle: Handle) -> Option<Node<T>> {
        self.help_resize();
        let key = handle.raw_handle();
        let key = match self.primary.locate(&self.nodes, key) {
            Some(link) => self.primary.detach(&mut self.nodes, link),
            None => {
                let old = self.secondary.as_mut()?;
                let link = old.locate(&self.nodes, key)?;
                old.detach(&mut self.nodes, link)
            }
        }?;
        self.nodes.remove(key).map(|s| s.node)
    }

    pub fn get(&self, handle: Handle) -> Option<&Node<T>> {
        self.nodes.get(handle.raw_handle()).map(|s| &s.node)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.nodes
            .get_mut(handle.raw_handle())
            .map(|s| s.node.payload_mut())
    }

    /// Visit every node: all of `primary`, then all of `secondary`.
    pub fn scan<F>(&self, mut visit: F)
    where
        F: FnMut(&Node<T>),
    {
        self.primary.scan(&self.nodes, |_, n| visit(n));
        if let Some(old) = &self.secondary {
            old.scan(&self.nodes, |_, n| visit(n));
        }
    }

    /// Nodes in `scan` order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            primary: self.primary.chains(&self.nodes),
            secondary: self.secondary.as_ref().map(|old| old.chains(&self.nodes)),
        }
    }

    /// Mutable payloads, in arena order rather than bucket order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            it: self.nodes.iter_mut(),
        }
    }

    /// Check both tables and the counters against a full walk.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        self.primary.assert_invariants(&self.nodes);
        if let Some(old) = &self.secondary {
            assert!(old.is_allocated(), "secondary present but unallocated");
            assert_eq!(old.capacity() * 2, self.primary.capacity());
            old.assert_invariants(&self.nodes);
        }
        assert_eq!(self.len(), self.count_by_scan());
        assert_eq!(self.len(), self.nodes.len());
    }

    /// Drop every node and return to the unallocated state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.primary = BucketTable::empty();
        self.secondary = None;
        self.resize_cursor = 0;
    }
}

impl<T> Default for ProgressiveMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for ProgressiveMap<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter().map(|(_, n)| n)).finish()
    }
}

/// Iterator over nodes in `scan` order.
pub struct Iter<'a, T> {
    primary: Chains<'a, T>,
    secondary: Option<Chains<'a, T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Handle, &'a Node<T>);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.primary
            .next()
            .or_else(|| self.secondary.as_mut()?.next())
            .map(|(k, n)| (Handle::new(k), n))
    }
}

/// Iterator over mutable payloads.
pub struct IterMut<'a, T> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Linked<T>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (Handle, &'a mut T);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(k, s)| (Handle::new(k), s.node.payload_mut()))
    }
}
