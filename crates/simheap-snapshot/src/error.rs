//! Error types for snapshot capture and restore.

use std::fmt;
use std::io;

use simheap_arena::HeapError;

/// Errors that can occur while saving, loading, or comparing heap state.
#[derive(Debug)]
pub enum SnapshotError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The stream is truncated or describes an impossible heap.
    ///
    /// Loading never applies any part of a corrupt stream.
    CorruptStream {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The heap rejected an operation (dead root, dangling pointer,
    /// capacity exhausted).
    Heap(HeapError),
}

impl SnapshotError {
    pub(crate) fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptStream {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::CorruptStream { detail } => write!(f, "corrupt state stream: {detail}"),
            Self::Heap(e) => write!(f, "heap error: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Heap(e) => Some(e),
            Self::CorruptStream { .. } => None,
        }
    }
}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<HeapError> for SnapshotError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}
