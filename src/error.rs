//! Error types for map construction.

use thiserror::Error;

/// Rejected `Config` values.
///
/// Everything else the engine does is total: absent keys are reported as
/// `None`, and table-level precondition violations panic.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The initial table capacity was zero.
    #[error("initial capacity must be non-zero")]
    ZeroCapacity,

    /// The initial table capacity was not a power of two.
    #[error("initial capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(usize),

    /// A zero load factor would start a resize on every insert.
    #[error("max load factor must be non-zero")]
    ZeroLoadFactor,

    /// A zero work budget would never drain a resize.
    #[error("resize work per operation must be non-zero")]
    ZeroResizeWork,
}
