//! Strongly-typed identifiers: [`TypeId`] and [`Address`].

use std::fmt;

/// Identifies a record type within a [`TypeRegistry`](crate::TypeRegistry).
///
/// Types are registered in order and assigned sequential IDs, so
/// `TypeId(n)` is the n-th registered type. The ID doubles as the type
/// tag written into block headers and snapshot streams, which is why it
/// must stay stable for the registry's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u16);

impl TypeId {
    /// Largest representable record type ID.
    ///
    /// Element tags reserve the top bit to mark "pointer to record", so
    /// record IDs must fit in the remaining 15 bits.
    pub const MAX: TypeId = TypeId(0x7FFF);
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u16> for TypeId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Byte address of a block inside a heap.
///
/// Address `0` is the null sentinel and is never handed out by the
/// allocator; the first concrete block starts at [`Address::FIRST`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u32);

impl Address {
    /// The null pointer value.
    pub const NULL: Address = Address(0);

    /// Lowest address the allocator ever hands out.
    pub const FIRST: Address = Address(4);

    /// Whether this is the null sentinel.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The address `bytes` past this one, or `None` on overflow.
    pub fn checked_add(self, bytes: u32) -> Option<Address> {
        self.0.checked_add(bytes).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

impl From<u32> for Address {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
