//! The heap: allocation, deallocation, and liveness bookkeeping.
//!
//! A [`Heap`] owns one [`Storage`] buffer, one [`FreeList`], and a shared
//! handle to the [`TypeRegistry`] that sizes its blocks. Allocation is
//! first-fit over the free list; deallocation returns the block's full
//! range and merges it with touching free neighbours.
//!
//! Two heaps that run the same sequence of allocations and frees hand
//! out the same addresses: nothing in the allocation path depends on
//! hashing, timing, or buffer capacity.

use std::collections::BTreeMap;
use std::sync::Arc;

use simheap_core::{Address, ElementType, TypeId, TypeRegistry};

use crate::block::{BlockHeader, HEADER_SIZE};
use crate::config::HeapConfig;
use crate::error::HeapError;
use crate::freelist::{FreeList, FreeSpan};
use crate::handle::{ArrayRef, BlockRef, ObjectRef};
use crate::storage::Storage;

/// Bookkeeping for one live block.
#[derive(Clone, Copy, Debug)]
struct LiveBlock {
    generation: u64,
    header: BlockHeader,
    len: u32,
}

/// A typed, relocatable simulation heap.
///
/// Single-threaded by contract: the owning simulation is the only
/// mutator. Dropping the heap invalidates every outstanding handle.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use simheap_arena::{Heap, RecordPtr};
/// use simheap_core::TypeRegistry;
///
/// let mut registry = TypeRegistry::new();
/// let node = registry.register("Node", &[("value", "int"), ("next", "Node*")]).unwrap();
/// let mut heap = Heap::new(Arc::new(registry));
///
/// let a = heap.new_object(node).unwrap();
/// let b = heap.new_object(node).unwrap();
/// heap.set(a, 0, 7i32).unwrap();
///
/// let next = heap.field::<RecordPtr>(a, 1).unwrap();
/// heap.point_to(next, Some(b)).unwrap();
/// assert_eq!(heap.deref(next).unwrap(), Some(b));
///
/// heap.delete_object(b).unwrap();
/// assert!(heap.get::<i32>(b, 0).is_err());
/// ```
pub struct Heap {
    registry: Arc<TypeRegistry>,
    config: HeapConfig,
    storage: Storage,
    free: FreeList,
    live: BTreeMap<Address, LiveBlock>,
    /// Next generation to hand out. Never reused, even across `reset()`.
    next_generation: u64,
}

impl Heap {
    /// Create a heap with the default configuration.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::build(registry, HeapConfig::default())
    }

    /// Create a heap with a custom configuration.
    pub fn with_config(registry: Arc<TypeRegistry>, config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: Arc<TypeRegistry>, config: HeapConfig) -> Self {
        Self {
            storage: Storage::new(config.initial_capacity, config.growth, config.max_capacity),
            free: FreeList::new(Address::FIRST, config.max_capacity),
            registry,
            config,
            live: BTreeMap::new(),
            next_generation: 1,
        }
    }

    /// The registry that sizes this heap's blocks.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The configuration this heap was built with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    // ── Allocation ──────────────────────────────────────────────

    /// Allocate a zeroed record of `type_id`.
    ///
    /// All value fields read as zero and all pointer fields as null.
    pub fn new_object(&mut self, type_id: TypeId) -> Result<ObjectRef, HeapError> {
        let header = BlockHeader::Object { type_id };
        let (address, generation) = self.allocate(header)?;
        Ok(ObjectRef {
            address,
            generation,
            type_id,
        })
    }

    /// Allocate a zeroed array of `count` elements.
    ///
    /// Fails with `InvalidLength` if `count` is negative or the array
    /// would not fit in the address space, and with a registry error if a
    /// pointer element names an unregistered record type.
    pub fn new_array(&mut self, element: ElementType, count: i32) -> Result<ArrayRef, HeapError> {
        let len = u32::try_from(count).map_err(|_| HeapError::InvalidLength {
            count: i64::from(count),
        })?;
        if let ElementType::Ptr(t) = element {
            self.registry.get(t)?;
        }
        let header = BlockHeader::Array {
            element,
            count: len,
        };
        let (address, generation) = self.allocate(header)?;
        Ok(ArrayRef {
            address,
            generation,
            element,
            len,
        })
    }

    fn allocate(&mut self, header: BlockHeader) -> Result<(Address, u64), HeapError> {
        let len = header.block_len(&self.registry).map_err(|e| match (e, header) {
            (HeapError::CapacityExceeded { .. }, BlockHeader::Array { count, .. })
            | (HeapError::InvalidLength { .. }, BlockHeader::Array { count, .. }) => {
                HeapError::InvalidLength {
                    count: i64::from(count),
                }
            }
            (e, _) => e,
        })?;
        let address = self.free.carve(len).ok_or(HeapError::CapacityExceeded {
            requested: u64::from(len),
            capacity: u64::from(self.config.max_capacity),
        })?;

        // `carve` never returns a range past `max_capacity`, which fits in u32.
        let end = address.0 as usize + len as usize;
        self.storage.ensure(end);
        let bytes = self.storage.slice_mut(address.0, len);
        bytes.fill(0);
        bytes[..HEADER_SIZE as usize].copy_from_slice(&header.encode());

        let generation = self.next_generation;
        self.next_generation += 1;
        self.live.insert(
            address,
            LiveBlock {
                generation,
                header,
                len,
            },
        );
        tracing::trace!(address = address.0, len, generation, "allocated block");
        Ok((address, generation))
    }

    // ── Deallocation ────────────────────────────────────────────

    /// Free the block starting at `address`.
    ///
    /// Fails with `DoubleFree` if `address` is not the start of a live
    /// block. Pointers to the freed block are not cleared; the caller must
    /// null them out or drop them before the address is reused.
    pub fn free(&mut self, address: Address) -> Result<(), HeapError> {
        let block = self
            .live
            .remove(&address)
            .ok_or(HeapError::DoubleFree { address })?;
        self.free.release(address, block.len);
        tracing::trace!(address = address.0, len = block.len, "freed block");
        Ok(())
    }

    /// Free a record through its handle.
    ///
    /// A stale handle fails with `DoubleFree`, even if another block now
    /// occupies the same address.
    pub fn delete_object(&mut self, object: ObjectRef) -> Result<(), HeapError> {
        self.delete(object.into())
    }

    /// Free an array through its handle. See [`Heap::delete_object`].
    pub fn delete_array(&mut self, array: ArrayRef) -> Result<(), HeapError> {
        self.delete(array.into())
    }

    /// Free either kind of block through its handle.
    pub fn delete(&mut self, block: BlockRef) -> Result<(), HeapError> {
        let address = block.address();
        match self.live.get(&address) {
            Some(live) if live.generation == block.generation() => self.free(address),
            _ => Err(HeapError::DoubleFree { address }),
        }
    }

    /// Discard every block and return the address space to a single
    /// unbounded free range starting at [`Address::FIRST`].
    ///
    /// Outstanding handles become stale; generations keep counting up so
    /// they can never match a block allocated after the reset.
    pub fn reset(&mut self) {
        tracing::debug!(live = self.live.len(), "resetting heap");
        self.live.clear();
        self.free = FreeList::new(Address::FIRST, self.config.max_capacity);
        self.storage.reset();
    }

    // ── Liveness ────────────────────────────────────────────────

    /// Whether `block` still refers to a live allocation.
    pub fn is_live(&self, block: BlockRef) -> bool {
        self.check(block.address(), block.generation()).is_ok()
    }

    pub(crate) fn check(&self, address: Address, generation: u64) -> Result<(), HeapError> {
        match self.live.get(&address) {
            Some(live) if live.generation == generation => Ok(()),
            _ => Err(HeapError::UseAfterFree { address }),
        }
    }

    /// Build a handle for the live block starting at `address`.
    ///
    /// Fails with `UseAfterFree` if no live block starts there.
    pub fn resolve(&self, address: Address) -> Result<BlockRef, HeapError> {
        let live = self
            .live
            .get(&address)
            .ok_or(HeapError::UseAfterFree { address })?;
        Ok(match live.header {
            BlockHeader::Object { type_id } => BlockRef::Object(ObjectRef {
                address,
                generation: live.generation,
                type_id,
            }),
            BlockHeader::Array { element, count } => BlockRef::Array(ArrayRef {
                address,
                generation: live.generation,
                element,
                len: count,
            }),
        })
    }

    // ── Raw payload access ──────────────────────────────────────

    /// The payload bytes of a live block (everything after the header).
    pub fn payload(&self, block: BlockRef) -> Result<&[u8], HeapError> {
        let len = self.payload_len(block)?;
        Ok(self.storage.slice(block.address().0 + HEADER_SIZE, len))
    }

    /// Mutable payload bytes of a live block.
    ///
    /// Pointer slots are written verbatim: the caller is responsible for
    /// storing only null or addresses of compatible live blocks.
    pub fn payload_mut(&mut self, block: BlockRef) -> Result<&mut [u8], HeapError> {
        let len = self.payload_len(block)?;
        Ok(self.storage.slice_mut(block.address().0 + HEADER_SIZE, len))
    }

    fn payload_len(&self, block: BlockRef) -> Result<u32, HeapError> {
        self.check(block.address(), block.generation())?;
        let live = self
            .live
            .get(&block.address())
            .ok_or(HeapError::UseAfterFree {
                address: block.address(),
            })?;
        Ok(live.len - HEADER_SIZE)
    }

    pub(crate) fn bytes(&self, address: Address, len: u32) -> &[u8] {
        self.storage.slice(address.0, len)
    }

    pub(crate) fn bytes_mut(&mut self, address: Address, len: u32) -> &mut [u8] {
        self.storage.slice_mut(address.0, len)
    }

    // ── Introspection ───────────────────────────────────────────

    /// Free ranges in address order; the last one is the unbounded tail.
    pub fn free_spans(&self) -> Vec<FreeSpan> {
        self.free.spans().collect()
    }

    /// Live blocks in address order, as `(address, length in bytes)`.
    pub fn live_blocks(&self) -> impl Iterator<Item = (Address, u32)> + '_ {
        self.live.iter().map(|(&address, block)| (address, block.len))
    }

    /// Number of live blocks.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Total bytes occupied by live blocks, headers included.
    pub fn used_bytes(&self) -> u64 {
        self.live.values().map(|b| u64::from(b.len)).sum()
    }

    /// Physical size of the backing buffer.
    pub fn capacity_bytes(&self) -> usize {
        self.storage.len()
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("live", &self.live.len())
            .field("free_spans", &self.free.len())
            .field("capacity_bytes", &self.storage.len())
            .finish()
    }
}
