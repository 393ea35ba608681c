//! Accessor handles.
//!
//! Handles are plain `Copy` values: an address plus the generation the
//! block had when the handle was made. Every heap operation compares that
//! generation with the block's current one, so a handle to a freed block
//! fails with `UseAfterFree` instead of reading whatever now occupies the
//! address. Generations live in the heap's bookkeeping, never in heap
//! bytes, so they do not affect snapshot streams.

use std::fmt;
use std::marker::PhantomData;

use simheap_core::{
    Address, ElementType, FieldType, HeapValue, IntRect, IntVector, Num, NumRect, NumVector,
    TypeId,
};

use crate::block::BlockHeader;

/// Handle to a live record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct ObjectRef {
    pub(crate) address: Address,
    pub(crate) generation: u64,
    pub(crate) type_id: TypeId,
}

impl ObjectRef {
    /// Address of the block.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Generation of the allocation this handle refers to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

/// Handle to a live array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct ArrayRef {
    pub(crate) address: Address,
    pub(crate) generation: u64,
    pub(crate) element: ElementType,
    pub(crate) len: u32,
}

impl ArrayRef {
    /// Address of the block.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Generation of the allocation this handle refers to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Element type.
    pub fn element(&self) -> ElementType {
        self.element
    }

    /// Number of elements, fixed at allocation.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Handle to either kind of block. Used for root sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockRef {
    /// A record.
    Object(ObjectRef),
    /// An array.
    Array(ArrayRef),
}

impl BlockRef {
    /// Address of the block.
    pub fn address(&self) -> Address {
        match self {
            Self::Object(o) => o.address,
            Self::Array(a) => a.address,
        }
    }

    /// Generation of the allocation this handle refers to.
    pub fn generation(&self) -> u64 {
        match self {
            Self::Object(o) => o.generation,
            Self::Array(a) => a.generation,
        }
    }

    /// The block's header.
    pub fn header(&self) -> BlockHeader {
        match *self {
            Self::Object(o) => BlockHeader::Object { type_id: o.type_id },
            Self::Array(a) => BlockHeader::Array {
                element: a.element,
                count: a.len,
            },
        }
    }

    /// The field type a pointer to this block would have.
    pub fn pointer_type(&self) -> FieldType {
        self.header().pointer_type()
    }

    /// The record handle, if this is a record.
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Self::Object(o) => Some(*o),
            Self::Array(_) => None,
        }
    }

    /// The array handle, if this is an array.
    pub fn as_array(&self) -> Option<ArrayRef> {
        match self {
            Self::Array(a) => Some(*a),
            Self::Object(_) => None,
        }
    }
}

impl From<ObjectRef> for BlockRef {
    fn from(o: ObjectRef) -> Self {
        Self::Object(o)
    }
}

impl From<ArrayRef> for BlockRef {
    fn from(a: ArrayRef) -> Self {
        Self::Array(a)
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} (gen {})",
            self.pointer_type(),
            self.address(),
            self.generation()
        )
    }
}

/// Marker for record pointer slots: `FieldRef<RecordPtr>`.
#[derive(Clone, Copy, Debug)]
pub struct RecordPtr;

/// Marker for array pointer slots: `FieldRef<ArrayPtr>`.
#[derive(Clone, Copy, Debug)]
pub struct ArrayPtr;

mod sealed {
    pub trait Sealed {}
}

/// Rust-side types a [`FieldRef`] can be bound to.
///
/// Implemented for every [`HeapValue`] plus the [`RecordPtr`] and
/// [`ArrayPtr`] markers. The binding is checked once, when the accessor is
/// created; reads and writes through the accessor need no further checks
/// beyond liveness.
pub trait SlotType: sealed::Sealed {
    /// Whether a slot declared as `declared` can be bound to `Self`.
    fn accepts(declared: FieldType) -> bool;

    /// Name used in type mismatch errors.
    fn describe() -> String;
}

macro_rules! value_slot {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl SlotType for $ty {
                fn accepts(declared: FieldType) -> bool {
                    declared == FieldType::Value(<$ty as HeapValue>::VALUE_TYPE)
                }

                fn describe() -> String {
                    <$ty as HeapValue>::VALUE_TYPE.to_string()
                }
            }
        )*
    };
}

value_slot!(u8, i16, i32, i64, Num, IntVector, NumVector, IntRect, NumRect);

impl sealed::Sealed for RecordPtr {}

impl SlotType for RecordPtr {
    fn accepts(declared: FieldType) -> bool {
        matches!(declared, FieldType::Ptr(_))
    }

    fn describe() -> String {
        "record pointer".to_string()
    }
}

impl sealed::Sealed for ArrayPtr {}

impl SlotType for ArrayPtr {
    fn accepts(declared: FieldType) -> bool {
        matches!(declared, FieldType::ArrayPtr(_))
    }

    fn describe() -> String {
        "array pointer".to_string()
    }
}

/// Typed accessor for one field of a record or one element of an array.
///
/// Bound to an absolute byte address inside the owning block and to the
/// owner's generation. Freeing the owner invalidates the accessor.
#[must_use]
pub struct FieldRef<T> {
    pub(crate) owner: Address,
    pub(crate) generation: u64,
    pub(crate) address: Address,
    pub(crate) declared: FieldType,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FieldRef<T> {
    pub(crate) fn new(owner: Address, generation: u64, address: Address, declared: FieldType) -> Self {
        Self {
            owner,
            generation,
            address,
            declared,
            _marker: PhantomData,
        }
    }

    /// Address of the owning block.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Absolute address of the slot's first byte.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Declared type of the slot.
    pub fn declared(&self) -> FieldType {
        self.declared
    }
}

impl<T> Clone for FieldRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldRef<T> {}

impl<T> fmt::Debug for FieldRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRef")
            .field("owner", &self.owner)
            .field("generation", &self.generation)
            .field("address", &self.address)
            .field("declared", &self.declared)
            .finish()
    }
}
