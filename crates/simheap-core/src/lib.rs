//! Core types for the simheap simulation heap.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the allocator and the snapshot codec:
//! addresses and type ids, the fixed-size value types stored in heap
//! fields, the closed set of semantic field types, and the append-only
//! [`TypeRegistry`] of record layouts.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod id;
pub mod registry;
pub mod value;

pub use error::RegistryError;
pub use field::{ElementType, FieldType, ValueType, POINTER_SIZE};
pub use id::{Address, TypeId};
pub use registry::{FieldDescriptor, TypeDescriptor, TypeRegistry};
pub use value::{HeapValue, IntRect, IntVector, Num, NumRect, NumVector};
