//! Simheap: a typed, relocatable heap for deterministic lockstep simulations.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! simheap sub-crates. For most users, adding `simheap` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use simheap::prelude::*;
//!
//! let mut registry = TypeRegistry::new();
//! let unit = registry
//!     .register("Unit", &[("hp", "int"), ("pos", "numvect"), ("target", "Unit*")])
//!     .unwrap();
//! let mut heap = Heap::new(Arc::new(registry));
//!
//! let scout = heap.new_object(unit).unwrap();
//! let tank = heap.new_object(unit).unwrap();
//! heap.set(scout, 0, 40i32).unwrap();
//! heap.set(tank, 0, 250i32).unwrap();
//! let target = heap.field::<RecordPtr>(scout, 2).unwrap();
//! heap.point_to(target, Some(tank)).unwrap();
//!
//! // Save everything reachable from the scout, then restore it.
//! let bytes = save_state(&heap, &[scout.into()]).unwrap();
//! let roots = load_state(&mut heap, &bytes).unwrap();
//! let scout = roots[0].as_object().unwrap();
//! let tank = heap.deref(heap.field::<RecordPtr>(scout, 2).unwrap()).unwrap().unwrap();
//! assert_eq!(heap.get::<i32>(tank, 0).unwrap(), 250);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `simheap-core` | Addresses, value types, `Num`, the type registry |
//! | [`arena`] | `simheap-arena` | The heap, free list, handles, typed accessors |
//! | [`snapshot`] | `simheap-snapshot` | Graph-walk save/load, state hashing, divergence checks |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs, and the type registry (`simheap-core`).
///
/// Contains [`types::Address`], the fixed-point [`types::Num`], vector and
/// rectangle values, and [`types::TypeRegistry`].
pub use simheap_core as types;

/// Heap storage, allocation, and typed access (`simheap-arena`).
///
/// [`arena::Heap`] owns the address space; [`arena::ObjectRef`],
/// [`arena::ArrayRef`] and [`arena::FieldRef`] are generation-checked
/// handles into it.
pub use simheap_arena as arena;

/// Saving and restoring heap state (`simheap-snapshot`).
///
/// [`snapshot::save_state`] walks the graph reachable from a root set;
/// [`snapshot::load_state`] replaces heap contents with a saved graph.
/// [`snapshot::compare_states`] locates the first divergence between two
/// saved states.
pub use simheap_snapshot as snapshot;

/// Common imports for typical simheap usage.
///
/// ```rust
/// use simheap::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use simheap_core::{
        Address, ElementType, FieldType, IntRect, IntVector, Num, NumRect, NumVector, TypeId,
        TypeRegistry, ValueType,
    };

    // Heap and handles
    pub use simheap_arena::{
        ArrayPtr, ArrayRef, BlockRef, FieldRef, Heap, HeapConfig, ObjectRef, RecordPtr,
    };

    // Errors
    pub use simheap_arena::HeapError;
    pub use simheap_core::RegistryError;
    pub use simheap_snapshot::SnapshotError;

    // Save/load
    pub use simheap_snapshot::{compare_states, load_state, save_state, state_hash};
}
