//! Heap-specific error types.

use std::error::Error;
use std::fmt;

use simheap_core::{Address, RegistryError};

/// Errors that can occur during allocation, deallocation, or field access.
///
/// Every variant except `CapacityExceeded` is a contract violation by the
/// caller; none are retried internally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// A registry lookup failed (unknown type, unknown field name).
    Registry(RegistryError),
    /// A field index is outside the record's field list.
    NoSuchField {
        /// The record type's name.
        type_name: String,
        /// The requested field index.
        index: usize,
    },
    /// The accessor type does not match the declared field, element, or
    /// pointee type.
    TypeMismatch {
        /// The declared type.
        expected: String,
        /// The type that was requested or supplied.
        found: String,
    },
    /// An array index is outside `[0, len)`.
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The array length.
        len: u32,
    },
    /// An accessor refers to a block that has been freed.
    UseAfterFree {
        /// Address of the freed block.
        address: Address,
    },
    /// The address is not the start of a live block.
    DoubleFree {
        /// The address passed to `free`.
        address: Address,
    },
    /// An array length is negative or too large to address.
    InvalidLength {
        /// The requested element count.
        count: i64,
    },
    /// The address space bound would be exceeded.
    CapacityExceeded {
        /// Number of bytes requested.
        requested: u64,
        /// The configured address space bound.
        capacity: u64,
    },
    /// The heap configuration is unusable.
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "registry error: {e}"),
            Self::NoSuchField { type_name, index } => {
                write!(f, "type '{type_name}' has no field at index {index}")
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: declared {expected}, got {found}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for array of length {len}")
            }
            Self::UseAfterFree { address } => {
                write!(f, "use after free: block at {address} is no longer live")
            }
            Self::DoubleFree { address } => {
                write!(f, "double free: {address} is not a live block")
            }
            Self::InvalidLength { count } => write!(f, "invalid array length {count}"),
            Self::CapacityExceeded {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "heap capacity exceeded: requested {requested} bytes, address space {capacity} bytes"
                )
            }
            Self::InvalidConfig { reason } => write!(f, "invalid heap config: {reason}"),
        }
    }
}

impl Error for HeapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RegistryError> for HeapError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}
