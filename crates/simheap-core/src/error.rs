//! Type registry error types.
//!
//! Registry misuse is always a programming error in the caller's
//! metadata, so none of these are expected to be recovered from.

use std::error::Error;
use std::fmt;

use crate::id::TypeId;

/// Errors from registering or looking up record types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A type with this name is already registered.
    DuplicateType {
        /// The conflicting type name.
        name: String,
    },
    /// A type name is empty, contains `*`, or shadows a built-in value type.
    InvalidTypeName {
        /// The rejected name.
        name: String,
    },
    /// A type name (or type ID) is not registered.
    UnknownType {
        /// The unknown name, or the ID rendered as text.
        name: String,
    },
    /// A field name does not exist on the given type.
    UnknownField {
        /// The type that was searched.
        type_name: String,
        /// The missing field name.
        field: String,
    },
    /// Two fields of one type share a name.
    DuplicateField {
        /// The type being registered.
        type_name: String,
        /// The repeated field name.
        field: String,
    },
    /// A field declaration cannot be mapped to a semantic type.
    InvalidFieldType {
        /// The field being declared.
        field: String,
        /// The declaration text.
        declaration: String,
    },
    /// The registry cannot hold more record types.
    TooManyTypes {
        /// Highest ID that can be assigned.
        max: TypeId,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateType { name } => write!(f, "type '{name}' is already registered"),
            Self::InvalidTypeName { name } => write!(f, "invalid type name '{name}'"),
            Self::UnknownType { name } => write!(f, "unknown type '{name}'"),
            Self::UnknownField { type_name, field } => {
                write!(f, "type '{type_name}' has no field '{field}'")
            }
            Self::DuplicateField { type_name, field } => {
                write!(f, "type '{type_name}' declares field '{field}' twice")
            }
            Self::InvalidFieldType { field, declaration } => {
                write!(f, "field '{field}' has invalid type '{declaration}'")
            }
            Self::TooManyTypes { max } => {
                write!(f, "type registry is full (max id {max})")
            }
        }
    }
}

impl Error for RegistryError {}
