//! Graph-walk snapshots of a simheap [`Heap`](simheap_arena::Heap).
//!
//! Saving walks the pointer graph breadth-first from a root set and emits
//! every reachable block with compacted addresses; unreachable blocks are
//! dropped. Loading validates the whole stream, resets the heap, and
//! rebuilds it block by block, translating pointers as it goes.
//!
//! # Architecture
//!
//! - [`save_state`] / [`write_state`] capture a root set
//! - [`load_state`] / [`read_state`] replace a heap's contents
//! - [`state_hash`] and [`compare_states`] verify lockstep agreement
//! - All I/O uses a custom binary codec (no serde dependency)
//!
//! # Format
//!
//! ```text
//! [root_count u32] [root u32]...
//! [Block 1] [Block 2] ... [Block N]
//! ```
//!
//! Each block is `kind u8`, `tag u16`, `length_or_count u32`, then the
//! payload with pointers rewritten to stream addresses. Stream addresses
//! start at 4 and advance by header plus payload, so they are the
//! addresses the blocks occupy after loading into a reset heap.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use simheap_arena::{Heap, RecordPtr};
//! use simheap_core::TypeRegistry;
//! use simheap_snapshot::{load_state, save_state};
//!
//! let mut registry = TypeRegistry::new();
//! let node = registry.register("Node", &[("value", "int"), ("next", "Node*")]).unwrap();
//! let registry = Arc::new(registry);
//!
//! let mut heap = Heap::new(registry.clone());
//! let a = heap.new_object(node).unwrap();
//! let b = heap.new_object(node).unwrap();
//! heap.set(b, 0, 42i32).unwrap();
//! let next = heap.field::<RecordPtr>(a, 1).unwrap();
//! heap.point_to(next, Some(b)).unwrap();
//!
//! let bytes = save_state(&heap, &[a.into()]).unwrap();
//!
//! let mut copy = Heap::new(registry);
//! let roots = load_state(&mut copy, &bytes).unwrap();
//! let a2 = roots[0].as_object().unwrap();
//! let next2 = copy.field::<RecordPtr>(a2, 1).unwrap();
//! let b2 = copy.deref(next2).unwrap().unwrap();
//! assert_eq!(copy.get::<i32>(b2, 0).unwrap(), 42);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod compare;
pub mod error;
pub mod hash;
pub mod reader;
pub mod types;
pub mod writer;

pub use compare::{compare_states, Divergence};
pub use error::SnapshotError;
pub use hash::{heap_hash, state_hash};
pub use reader::{load_state, read_state, restore, validate};
pub use types::{BlockImage, StateImage};
pub use writer::{capture, save_state, write_state};
