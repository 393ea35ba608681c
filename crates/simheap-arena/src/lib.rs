//! Typed, relocatable heap storage for simheap simulations.
//!
//! A [`Heap`] is one contiguous 32-bit address space carved into blocks.
//! Every block starts with a header naming its record type or array
//! element type, so block lengths are always recoverable from heap bytes
//! alone. Free space is tracked in an address-ordered list whose last
//! range is unbounded.
//!
//! # Architecture
//!
//! ```text
//! Heap
//! ├── Arc<TypeRegistry>   (record layouts, shared with the codec)
//! ├── Storage             (growable Vec<u8>; address N is byte N)
//! ├── FreeList            (slab-linked spans, first fit, merge on free)
//! └── live: BTreeMap<Address, LiveBlock>
//!         (header, length, generation of every live block)
//! ```
//!
//! # Handles and generations
//!
//! [`ObjectRef`], [`ArrayRef`] and [`FieldRef`] are `Copy` handles that
//! carry the generation of the block they were created against. The heap
//! checks that generation on every access, turning use-after-free into
//! [`HeapError::UseAfterFree`] rather than silent corruption.
//!
//! # Determinism
//!
//! Given the same registry and the same sequence of allocations and
//! frees, two heaps return the same addresses. Growth of the backing
//! buffer never moves a block.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod access;
pub mod block;
pub mod config;
pub mod error;
pub mod freelist;
pub mod handle;
pub mod heap;
mod storage;

pub use block::{BlockHeader, HEADER_SIZE};
pub use config::{GrowthPolicy, HeapConfig};
pub use error::HeapError;
pub use freelist::{Extent, FreeSpan};
pub use handle::{ArrayPtr, ArrayRef, BlockRef, FieldRef, ObjectRef, RecordPtr, SlotType};
pub use heap::Heap;
