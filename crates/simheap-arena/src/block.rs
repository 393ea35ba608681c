//! Block headers.
//!
//! Every block starts with an 8-byte header that fully determines the
//! block's length:
//!
//! ```text
//! [kind u8] [0u8] [tag u16 LE] [count u32 LE] [payload ...]
//! ```
//!
//! Objects store their record type ID in `tag` and `0` in `count`.
//! Arrays store their [`ElementType::tag`] and element count. Headers are
//! written once at allocation and never mutated.

use simheap_core::{ElementType, FieldType, TypeId, TypeRegistry, POINTER_SIZE};

use crate::error::HeapError;

/// Size of a block header in bytes.
pub const HEADER_SIZE: u32 = 8;

const KIND_OBJECT: u8 = 0;
const KIND_ARRAY: u8 = 1;

/// Decoded block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockHeader {
    /// A record of the given type.
    Object {
        /// Record type.
        type_id: TypeId,
    },
    /// An array of `count` elements.
    Array {
        /// Element type.
        element: ElementType,
        /// Number of elements.
        count: u32,
    },
}

impl BlockHeader {
    /// Size of the payload that follows the header.
    pub fn payload_size(&self, registry: &TypeRegistry) -> Result<u32, HeapError> {
        match *self {
            Self::Object { type_id } => Ok(registry.get(type_id)?.payload_size()),
            Self::Array { element, count } => {
                count
                    .checked_mul(element.size())
                    .ok_or(HeapError::InvalidLength {
                        count: i64::from(count),
                    })
            }
        }
    }

    /// Total block length: header plus payload.
    pub fn block_len(&self, registry: &TypeRegistry) -> Result<u32, HeapError> {
        let payload = self.payload_size(registry)?;
        HEADER_SIZE
            .checked_add(payload)
            .ok_or(HeapError::CapacityExceeded {
                requested: u64::from(HEADER_SIZE) + u64::from(payload),
                capacity: u64::from(u32::MAX),
            })
    }

    /// The field type a pointer to a block with this header would have.
    pub fn pointer_type(&self) -> FieldType {
        match *self {
            Self::Object { type_id } => FieldType::Ptr(type_id),
            Self::Array { element, .. } => FieldType::ArrayPtr(element),
        }
    }

    /// Pointer slots in the payload, as `(payload offset, declared type)`,
    /// in ascending offset order.
    pub fn pointer_slots(&self, registry: &TypeRegistry) -> Result<Vec<(u32, FieldType)>, HeapError> {
        match *self {
            Self::Object { type_id } => Ok(registry
                .get(type_id)?
                .pointer_fields()
                .map(|f| (f.offset, f.field_type))
                .collect()),
            Self::Array {
                element: ElementType::Ptr(t),
                count,
            } => Ok((0..count).map(|i| (i * POINTER_SIZE, FieldType::Ptr(t))).collect()),
            Self::Array { .. } => Ok(Vec::new()),
        }
    }

    /// Encode into the in-heap byte layout.
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let (kind, tag, count) = match *self {
            Self::Object { type_id } => (KIND_OBJECT, type_id.0, 0),
            Self::Array { element, count } => (KIND_ARRAY, element.tag(), count),
        };
        let mut out = [0u8; HEADER_SIZE as usize];
        out[0] = kind;
        out[2..4].copy_from_slice(&tag.to_le_bytes());
        out[4..8].copy_from_slice(&count.to_le_bytes());
        out
    }

    /// Decode from the in-heap byte layout.
    ///
    /// Returns `None` if the kind byte or element tag is not recognised,
    /// or if `bytes` is shorter than [`HEADER_SIZE`].
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return None;
        }
        let tag = u16::from_le_bytes([bytes[2], bytes[3]]);
        let count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        match bytes[0] {
            KIND_OBJECT => Some(Self::Object {
                type_id: TypeId(tag),
            }),
            KIND_ARRAY => ElementType::from_tag(tag).map(|element| Self::Array { element, count }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simheap_core::ValueType;

    #[test]
    fn header_layout() {
        let header = BlockHeader::Array {
            element: ElementType::Value(ValueType::Short),
            count: 3,
        };
        assert_eq!(header.encode(), [1, 0, 1, 0, 3, 0, 0, 0]);
        assert_eq!(BlockHeader::decode(&header.encode()), Some(header));

        let object = BlockHeader::Object { type_id: TypeId(7) };
        assert_eq!(object.encode(), [0, 0, 7, 0, 0, 0, 0, 0]);
        assert_eq!(BlockHeader::decode(&object.encode()), Some(object));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(BlockHeader::decode(&[9, 0, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(BlockHeader::decode(&[1, 0, 99, 0, 0, 0, 0, 0]), None);
        assert_eq!(BlockHeader::decode(&[0, 0]), None);
    }

    #[test]
    fn lengths_come_from_header() {
        let mut reg = TypeRegistry::new();
        let pair = reg.register("Pair", &[("a", "int"), ("b", "long")]).unwrap();

        let object = BlockHeader::Object { type_id: pair };
        assert_eq!(object.block_len(&reg).unwrap(), HEADER_SIZE + 12);

        let array = BlockHeader::Array {
            element: ElementType::Value(ValueType::NumRect),
            count: 4,
        };
        assert_eq!(array.block_len(&reg).unwrap(), HEADER_SIZE + 64);

        let empty = BlockHeader::Array {
            element: ElementType::Ptr(pair),
            count: 0,
        };
        assert_eq!(empty.block_len(&reg).unwrap(), HEADER_SIZE);
    }

    #[test]
    fn pointer_slots_cover_pointer_fields_and_elements() {
        let mut reg = TypeRegistry::new();
        let node = reg
            .register("Node", &[("v", "int"), ("next", "Node*"), ("xs", "long*")])
            .unwrap();
        let object = BlockHeader::Object { type_id: node };
        assert_eq!(
            object.pointer_slots(&reg).unwrap(),
            vec![
                (4, FieldType::Ptr(node)),
                (8, FieldType::ArrayPtr(ElementType::Value(ValueType::Long)))
            ]
        );

        let ptrs = BlockHeader::Array {
            element: ElementType::Ptr(node),
            count: 3,
        };
        let offsets: Vec<u32> = ptrs.pointer_slots(&reg).unwrap().iter().map(|s| s.0).collect();
        assert_eq!(offsets, vec![0, 4, 8]);

        let ints = BlockHeader::Array {
            element: ElementType::Value(ValueType::Int),
            count: 3,
        };
        assert!(ints.pointer_slots(&reg).unwrap().is_empty());
    }

    #[test]
    fn unknown_object_type_is_a_registry_error() {
        let reg = TypeRegistry::new();
        let header = BlockHeader::Object { type_id: TypeId(0) };
        assert!(matches!(
            header.payload_size(&reg),
            Err(HeapError::Registry(_))
        ));
    }
}
