//! Growable byte buffer backing the heap's address space.
//!
//! The address space is conceptually unbounded (up to the configured
//! limit); [`Storage`] only materialises the prefix that has actually been
//! carved. Growth appends zeroed bytes and never moves existing data
//! relative to its address.

use crate::config::GrowthPolicy;

/// The physical bytes behind a heap's address space.
pub struct Storage {
    data: Vec<u8>,
    initial_capacity: usize,
    growth: GrowthPolicy,
    /// Hard cap on the buffer length, in bytes.
    limit: usize,
}

impl Storage {
    /// Create a zeroed buffer of `initial_capacity` bytes.
    pub fn new(initial_capacity: u32, growth: GrowthPolicy, limit: u32) -> Self {
        Self {
            data: vec![0; initial_capacity as usize],
            initial_capacity: initial_capacity as usize,
            growth,
            limit: limit as usize,
        }
    }

    /// Make sure bytes `[0, end)` are physically present.
    ///
    /// Returns `true` if the buffer had to grow.
    pub fn ensure(&mut self, end: usize) -> bool {
        if end <= self.data.len() {
            return false;
        }
        let target = match self.growth {
            GrowthPolicy::Doubling => end.max(self.data.len().saturating_mul(2)).min(self.limit.max(end)),
            GrowthPolicy::ToFit => end,
        };
        tracing::debug!(from = self.data.len(), to = target, "growing heap storage");
        self.data.resize(target, 0);
        true
    }

    /// Bytes `[address, address + len)`.
    ///
    /// # Panics
    ///
    /// Panics if the range has not been materialised by [`Storage::ensure`].
    pub fn slice(&self, address: u32, len: u32) -> &[u8] {
        let start = address as usize;
        &self.data[start..start + len as usize]
    }

    /// Mutable bytes `[address, address + len)`.
    ///
    /// # Panics
    ///
    /// Panics if the range has not been materialised by [`Storage::ensure`].
    pub fn slice_mut(&mut self, address: u32, len: u32) -> &mut [u8] {
        let start = address as usize;
        &mut self.data[start..start + len as usize]
    }

    /// Drop all contents and shrink back to the initial capacity.
    pub fn reset(&mut self) {
        self.data.clear();
        self.data.resize(self.initial_capacity, 0);
    }

    /// Physical length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
