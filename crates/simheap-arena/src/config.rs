//! Heap configuration parameters.

use crate::error::HeapError;

/// How the backing buffer grows when a carve runs past its end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GrowthPolicy {
    /// Double the buffer (or grow to fit, whichever is larger).
    #[default]
    Doubling,
    /// Grow exactly to the end of the new block.
    ToFit,
}

/// Configuration for a [`Heap`](crate::Heap).
///
/// Controls the initial buffer size, how the buffer grows, and the
/// upper bound of the address space. Growth never moves a block: only
/// the physical buffer behind the address space changes.
#[derive(Clone, Debug)]
pub struct HeapConfig {
    /// Bytes pre-allocated for the backing buffer.
    ///
    /// Default: 4096.
    pub initial_capacity: u32,

    /// Growth policy for the backing buffer.
    ///
    /// Default: [`GrowthPolicy::Doubling`].
    pub growth: GrowthPolicy,

    /// Exclusive upper bound on block addresses, in bytes.
    ///
    /// Allocations that would end past this bound fail with
    /// `CapacityExceeded`. Default: `u32::MAX`. Must be greater than
    /// [`Address::FIRST`](simheap_core::Address::FIRST).
    ///
    /// Blocks are zero-filled when carved, so under the default a single
    /// `new_array(Byte, i32::MAX)` materialises about 2 GiB of storage.
    /// Hosts that accept untrusted sizes should set a tighter bound; the
    /// check happens before the buffer grows.
    pub max_capacity: u32,
}

impl HeapConfig {
    /// Default initial buffer size in bytes.
    pub const DEFAULT_INITIAL_CAPACITY: u32 = 4096;

    /// Default address space bound.
    pub const DEFAULT_MAX_CAPACITY: u32 = u32::MAX;

    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
            growth: GrowthPolicy::default(),
            max_capacity: Self::DEFAULT_MAX_CAPACITY,
        }
    }

    /// Check that the parameters describe a usable heap.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.max_capacity <= simheap_core::Address::FIRST.0 {
            return Err(HeapError::InvalidConfig {
                reason: format!(
                    "max_capacity ({}) leaves no room for blocks",
                    self.max_capacity
                ),
            });
        }
        if self.initial_capacity > self.max_capacity {
            return Err(HeapError::InvalidConfig {
                reason: format!(
                    "initial_capacity ({}) exceeds max_capacity ({})",
                    self.initial_capacity, self.max_capacity
                ),
            });
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HeapConfig::default();
        assert_eq!(config.initial_capacity, 4096);
        assert_eq!(config.growth, GrowthPolicy::Doubling);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tiny_address_space_rejected() {
        let config = HeapConfig {
            initial_capacity: 0,
            max_capacity: 4,
            ..HeapConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HeapError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn initial_capacity_bounded_by_max() {
        let config = HeapConfig {
            initial_capacity: 1024,
            max_capacity: 512,
            ..HeapConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
