//! Construction-time tunables for `ProgressiveMap`.

use crate::error::ConfigError;

/// Capacity of the first table allocated on the first insert.
pub const DEFAULT_INITIAL_CAPACITY: usize = 4;
/// Average chain length above which a resize starts.
pub const DEFAULT_MAX_LOAD_FACTOR: usize = 8;
/// Node migrations performed per public operation while resizing.
pub const DEFAULT_RESIZE_WORK: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub(crate) initial_capacity: usize,
    pub(crate) max_load_factor: usize,
    pub(crate) resize_work: usize,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            resize_work: DEFAULT_RESIZE_WORK,
        }
    }

    /// Capacity of the first table. Must be a non-zero power of two.
    pub const fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// A resize starts once `len > capacity * factor`.
    pub const fn with_max_load_factor(mut self, factor: usize) -> Self {
        self.max_load_factor = factor;
        self
    }

    /// Upper bound on nodes migrated by a single operation.
    pub const fn with_resize_work(mut self, work: usize) -> Self {
        self.resize_work = work;
        self
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }
    pub fn max_load_factor(&self) -> usize {
        self.max_load_factor
    }
    pub fn resize_work(&self) -> usize {
        self.resize_work
    }

    /// Check every field, returning the config unchanged when it is usable.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !self.initial_capacity.is_power_of_two() {
            return Err(ConfigError::CapacityNotPowerOfTwo(self.initial_capacity));
        }
        if self.max_load_factor == 0 {
            return Err(ConfigError::ZeroLoadFactor);
        }
        if self.resize_work == 0 {
            return Err(ConfigError::ZeroResizeWork);
        }
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
