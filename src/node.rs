//! Chain entries and the arena that owns them.

use slotmap::{DefaultKey, SlotMap};

/// A hash-table entry: a caller-computed hash code plus an arbitrary payload.
///
/// The engine only reads `hash_code` to pick a bucket and hands the payload
/// to caller-supplied equality closures. It never hashes or compares
/// payloads itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<T> {
    hash_code: u64,
    payload: T,
}

impl<T> Node<T> {
    pub fn new(hash_code: u64, payload: T) -> Self {
        Self { hash_code, payload }
    }

    #[inline]
    pub fn hash_code(&self) -> u64 {
        self.hash_code
    }

    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Mutable payload access. The hash code stays fixed so bucket
    /// placement is never invalidated through this reference.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn into_parts(self) -> (u64, T) {
        (self.hash_code, self.payload)
    }
}

/// Arena slot: a node and the key of its successor in the chain.
#[derive(Debug)]
pub(crate) struct Linked<T> {
    pub(crate) node: Node<T>,
    pub(crate) next: Option<DefaultKey>,
}

impl<T> Linked<T> {
    pub(crate) fn unlinked(node: Node<T>) -> Self {
        Self { node, next: None }
    }
}

/// Storage shared by both tables of a map. Chains link arena keys, so a
/// node moves between tables without moving in memory.
pub(crate) type Arena<T> = SlotMap<DefaultKey, Linked<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_and_parts() {
        let mut n = Node::new(0xabcd, String::from("v"));
        assert_eq!(n.hash_code(), 0xabcd);
        assert_eq!(n.payload(), "v");
        n.payload_mut().push('2');
        assert_eq!(n.clone().into_payload(), "v2");
        assert_eq!(n.into_parts(), (0xabcd, String::from("v2")));
    }

    #[test]
    fn unlinked_slot_has_no_successor() {
        let mut arena: Arena<u8> = Arena::with_key();
        let k = arena.insert(Linked::unlinked(Node::new(1, 7)));
        assert!(arena[k].next.is_none());
        assert_eq!(*arena[k].node.payload(), 7);
    }
}
