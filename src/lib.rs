//! progressive-map: the key-space engine of a small single-threaded
//! key-value server.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a chained hash table whose operations stay O(1) amortized while
//!   the table grows, without ever rehashing the whole key space in one
//!   call.
//! - Layers:
//!   - BucketTable: fixed power-of-two array of chain heads plus a size
//!     counter. Bucket selection is `hash & mask`.
//!   - ProgressiveMap<T>: owns the node arena and up to two BucketTables.
//!     New nodes always go to `primary`; while resizing, `secondary` (the
//!     overloaded table) is drained a bounded number of nodes per call.
//!   - KeySpace<K, V, S>: typed map for callers that want `K: Hash + Eq`
//!     keys instead of raw hash codes and equality closures.
//!
//! Resizing
//! - A resize starts when `primary.len() > primary.capacity() *
//!   max_load_factor`. The overloaded table becomes `secondary` and a table
//!   of twice its capacity becomes `primary`.
//! - Every public operation (`insert`, `lookup`, `find`, `pop`, `remove`,
//!   `size`, ...) first migrates at most `resize_work` nodes. Once
//!   `secondary` is empty it is dropped; resizes never overlap.
//! - Lookups probe `primary` before `secondary`. A node is linked into
//!   exactly one table at any time because migration detaches before it
//!   reinserts.
//!
//! Nodes and ownership
//! - Nodes live in a generational arena (`slotmap`); chains link arena
//!   keys. Moving a node between tables relinks keys and never moves the
//!   node, so `Handle`s stay valid across a resize.
//! - `pop` and `remove` move the node out of the arena and back to the
//!   caller. A handle to a popped node never resolves again.
//!
//! Constraints
//! - Single-threaded: every operation that may advance a resize takes
//!   `&mut self`.
//! - No deduplication in `ProgressiveMap::insert`; `KeySpace::insert` pops
//!   an existing entry first.
//! - Hash codes are computed once by the caller and stored in the node;
//!   the engine never hashes during migration.
//!
//! Failure semantics
//! - Absent keys are `None`.
//! - Invalid `Config` values are a `ConfigError` from the `try_*`
//!   constructors; a bad table capacity or capacity overflow is a panic.

mod config;
mod error;
mod key_space;
mod map;
mod map_proptest;
mod node;
mod table;

// Public surface
pub use config::{Config, DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_LOAD_FACTOR, DEFAULT_RESIZE_WORK};
pub use error::ConfigError;
pub use key_space::KeySpace;
pub use map::{Handle, Iter, IterMut, ProgressiveMap};
pub use node::Node;
