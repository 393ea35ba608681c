//! Semantic field types: the closed set of tags a record field may carry.
//!
//! A field is either an inline value ([`ValueType`]), a pointer to a
//! record, or a pointer to an array whose elements are described by an
//! [`ElementType`]. Sizes are fixed per tag, which is what lets a block
//! header alone determine a block's length.

use std::fmt;

use crate::id::TypeId;

/// Size in bytes of every pointer slot (record or array pointer).
pub const POINTER_SIZE: u32 = 4;

/// Built-in value types that can be stored inline in a field or array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Long,
    /// 32-bit fixed-point number ([`Num`](crate::Num)).
    Num,
    /// Pair of 32-bit integers ([`IntVector`](crate::IntVector)).
    IntVector,
    /// Pair of fixed-point numbers ([`NumVector`](crate::NumVector)).
    NumVector,
    /// Four 32-bit integers ([`IntRect`](crate::IntRect)).
    IntRect,
    /// Four fixed-point numbers ([`NumRect`](crate::NumRect)).
    NumRect,
}

impl ValueType {
    /// Every value type, in code order.
    pub const ALL: [ValueType; 9] = [
        ValueType::Byte,
        ValueType::Short,
        ValueType::Int,
        ValueType::Long,
        ValueType::Num,
        ValueType::IntVector,
        ValueType::NumVector,
        ValueType::IntRect,
        ValueType::NumRect,
    ];

    /// Encoded size in bytes.
    pub const fn size(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int | Self::Num => 4,
            Self::Long | Self::IntVector | Self::NumVector => 8,
            Self::IntRect | Self::NumRect => 16,
        }
    }

    /// Stable numeric code used in element tags.
    pub const fn code(self) -> u16 {
        match self {
            Self::Byte => 0,
            Self::Short => 1,
            Self::Int => 2,
            Self::Long => 3,
            Self::Num => 4,
            Self::IntVector => 5,
            Self::NumVector => 6,
            Self::IntRect => 7,
            Self::NumRect => 8,
        }
    }

    /// Inverse of [`ValueType::code`].
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Name used in textual field declarations (`"int"`, `"numvect"`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Num => "num",
            Self::IntVector => "intvect",
            Self::NumVector => "numvect",
            Self::IntRect => "intrect",
            Self::NumRect => "numrect",
        }
    }

    /// Look up a value type by its declaration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.name() == name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The element type of an array block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Inline values.
    Value(ValueType),
    /// Pointers to records of the given type.
    Ptr(TypeId),
}

impl ElementType {
    const PTR_TAG_BIT: u16 = 0x8000;

    /// Size of one element in bytes.
    pub const fn size(self) -> u32 {
        match self {
            Self::Value(v) => v.size(),
            Self::Ptr(_) => POINTER_SIZE,
        }
    }

    /// Whether elements are pointers that the snapshot walk must follow.
    pub const fn is_pointer(self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    /// Encode as the 16-bit tag used in block headers and streams.
    ///
    /// Value elements use their [`ValueType::code`]; pointer elements set
    /// the top bit and carry the record type ID in the low 15 bits.
    pub const fn tag(self) -> u16 {
        match self {
            Self::Value(v) => v.code(),
            Self::Ptr(t) => Self::PTR_TAG_BIT | t.0,
        }
    }

    /// Decode a tag produced by [`ElementType::tag`].
    ///
    /// Only checks the tag's shape; the caller must confirm that a pointer
    /// element's record type is registered.
    pub fn from_tag(tag: u16) -> Option<Self> {
        if tag & Self::PTR_TAG_BIT != 0 {
            Some(Self::Ptr(TypeId(tag & !Self::PTR_TAG_BIT)))
        } else {
            ValueType::from_code(tag).map(Self::Value)
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Ptr(t) => write!(f, "ptr({t})"),
        }
    }
}

/// Semantic type of a record field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// An inline value.
    Value(ValueType),
    /// A pointer to a record of the given type (or null).
    Ptr(TypeId),
    /// A pointer to an array with the given element type (or null).
    ArrayPtr(ElementType),
}

impl FieldType {
    /// Size of the field's storage in bytes.
    pub const fn size(self) -> u32 {
        match self {
            Self::Value(v) => v.size(),
            Self::Ptr(_) | Self::ArrayPtr(_) => POINTER_SIZE,
        }
    }

    /// Whether the field holds an address.
    pub const fn is_pointer(self) -> bool {
        !matches!(self, Self::Value(_))
    }
}

impl From<ElementType> for FieldType {
    fn from(e: ElementType) -> Self {
        match e {
            ElementType::Value(v) => FieldType::Value(v),
            ElementType::Ptr(t) => FieldType::Ptr(t),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Ptr(t) => write!(f, "ptr({t})"),
            Self::ArrayPtr(e) => write!(f, "array({e})"),
        }
    }
}
