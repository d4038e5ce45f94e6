//! KeySpace: a typed `K -> V` map on top of `ProgressiveMap`.
//!
//! This is how a server holds its key space: hash codes come from a
//! `BuildHasher`, equality from `K: Eq`, and upsert is pop-then-insert on
//! the engine underneath.

use crate::config::Config;
use crate::error::ConfigError;
use crate::map::ProgressiveMap;
use crate::node::Node;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
}

pub struct KeySpace<K, V, S = RandomState> {
    hasher: S,
    map: ProgressiveMap<Entry<K, V>>,
}

impl<K, V> KeySpace<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for KeySpace<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> KeySpace<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            map: ProgressiveMap::new(),
        }
    }

    pub fn try_with_config_and_hasher(config: Config, hasher: S) -> Result<Self, ConfigError> {
        Ok(Self {
            hasher,
            map: ProgressiveMap::try_with_config(config)?,
        })
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entry count after advancing any running resize.
    pub fn size(&mut self) -> usize {
        self.map.size()
    }

    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }
    pub fn is_resizing(&self) -> bool {
        self.map.is_resizing()
    }

    /// Insert or replace. Returns the previous value for `key`, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.make_hash(&key);
        let previous = self.map.pop(hash, |e| e.key == key);
        self.map.insert(Node::new(hash, Entry { key, value }));
        previous.map(|n| n.into_payload().value)
    }

    pub fn get<Q>(&mut self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.map
            .lookup(hash, |e| e.key.borrow() == q)
            .map(|n| &n.payload().value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.map
            .lookup_mut(hash, |e| e.key.borrow() == q)
            .map(|e| &mut e.value)
    }

    pub fn contains_key<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.map.contains(hash, |e| e.key.borrow() == q)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let e = self.map.pop(hash, |e| e.key.borrow() == q)?.into_payload();
        Some((e.key, e.value))
    }

    /// Entries in table scan order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter().map(|(_, n)| {
            let e = n.payload();
            (&e.key, &e.value)
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    /// Visit every entry without allocating, e.g. to answer a key listing.
    pub fn scan<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V),
    {
        self.map.scan(|n| {
            let e = n.payload();
            visit(&e.key, &e.value)
        });
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::hash::Hasher;

    /// Invariant: insert of an existing key replaces the value, returns the
    /// old one and leaves the size unchanged.
    #[test]
    fn upsert_replaces() {
        let mut m: KeySpace<String, i32> = KeySpace::new();
        assert_eq!(m.insert("k".to_string(), 1), None);
        assert_eq!(m.insert("k".to_string(), 2), Some(1));
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("k"), Some(&2));
    }

    /// Invariant: borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: KeySpace<String, i32> = KeySpace::new();
        m.insert("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert_eq!(m.remove("hello"), Some(1));
        assert!(!m.contains_key("hello"));
        assert!(m.is_empty());
    }

    #[test]
    fn get_mut_updates_value() {
        let mut m: KeySpace<&'static str, Vec<u8>> = KeySpace::new();
        m.insert("k", vec![1]);
        m.get_mut("k").unwrap().push(2);
        assert_eq!(m.get("k"), Some(&vec![1, 2]));
        assert!(m.get_mut("missing").is_none());
    }

    #[test]
    fn get_mut_during_resize_keeps_entry_removable() {
        let cfg = Config::new()
            .with_initial_capacity(1)
            .with_max_load_factor(1)
            .with_resize_work(1);
        let mut m: KeySpace<u32, u32> =
            KeySpace::try_with_config_and_hasher(cfg, RandomState::new()).unwrap();
        for k in 0..16 {
            m.insert(k, k);
        }
        for k in 0..16 {
            *m.get_mut(&k).unwrap() += 100;
        }
        for k in 0..16 {
            assert_eq!(m.remove(&k), Some(k + 100));
        }
        assert!(m.is_empty());
    }

    #[test]
    fn remove_entry_returns_owned_key() {
        let mut m: KeySpace<String, u8> = KeySpace::new();
        m.insert("a".to_string(), 9);
        assert_eq!(m.remove_entry("a"), Some(("a".to_string(), 9)));
        assert_eq!(m.remove_entry("a"), None);
    }

    /// Invariant: lookups work under heavy hash collisions; equality resolves
    /// to the correct entry, and resizing still terminates.
    #[test]
    fn collision_handling_with_const_hasher() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> Self::Hasher {
                ConstHasher
            }
        }
        impl Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            }
        }

        let cfg = Config::new().with_max_load_factor(2).with_resize_work(3);
        let mut m: KeySpace<u32, u32, ConstBuildHasher> =
            KeySpace::try_with_config_and_hasher(cfg, ConstBuildHasher).unwrap();
        for k in 0..50 {
            m.insert(k, k * 10);
        }
        while m.is_resizing() {
            m.size();
        }
        assert!(m.capacity() > 4);
        for k in 0..50 {
            assert_eq!(m.get(&k), Some(&(k * 10)));
        }
    }

    /// Invariant: iteration yields each live entry exactly once, also while a
    /// resize is in progress.
    #[test]
    fn keys_cover_both_tables() {
        let cfg = Config::new().with_resize_work(1);
        let mut m: KeySpace<u32, ()> =
            KeySpace::try_with_config_and_hasher(cfg, RandomState::new()).unwrap();
        for k in 0..200 {
            m.insert(k, ());
        }
        let keys: Vec<u32> = m.keys().copied().collect();
        assert_eq!(keys.len(), 200);
        let set: BTreeSet<u32> = keys.into_iter().collect();
        assert_eq!(set.len(), 200);

        let mut scanned = 0;
        m.scan(|_, _| scanned += 1);
        assert_eq!(scanned, 200);
    }

    #[test]
    fn clear_empties() {
        let mut m: KeySpace<u8, u8> = KeySpace::new();
        m.insert(1, 1);
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.get(&1), None);
    }
}
