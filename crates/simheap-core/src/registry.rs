//! The append-only record type registry.
//!
//! A [`TypeRegistry`] maps record type names to [`TypeDescriptor`]s and
//! assigns each a stable [`TypeId`] in registration order. Field
//! declarations use the heap's textual notation:
//!
//! | Declaration | Meaning |
//! |-------------|---------|
//! | `"num"` | inline value of a built-in type |
//! | `"int*"` | pointer to an array of `int` |
//! | `"Node*"` | pointer to a `Node` record |
//! | `"Node**"` | pointer to an array of `Node` pointers |
//!
//! A record may point to itself (`"Node*"` inside `Node`) before it is
//! fully registered; every other referenced record must already exist.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::RegistryError;
use crate::field::{ElementType, FieldType, ValueType};
use crate::id::TypeId;

/// A single field of a record type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name, unique within its type.
    pub name: String,
    /// Semantic type of the field.
    pub field_type: FieldType,
    /// Byte offset of the field within the record payload.
    pub offset: u32,
}

/// Layout of a registered record type.
///
/// Immutable once registered. Field order is the registration order and
/// determines both offsets and field indices.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    id: TypeId,
    name: String,
    fields: Vec<FieldDescriptor>,
    payload_size: u32,
    /// Indices of pointer fields, in field order. Cached for the snapshot walk.
    pointer_fields: SmallVec<[usize; 8]>,
}

impl TypeDescriptor {
    /// The type's ID.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// The field at `index`, if any.
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Index of the field called `name`, if any.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Total size of a record's payload in bytes.
    pub fn payload_size(&self) -> u32 {
        self.payload_size
    }

    /// Iterate over the pointer-typed fields, in declaration order.
    pub fn pointer_fields(&self) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.pointer_fields.iter().map(move |&i| &self.fields[i])
    }
}

/// Append-only table of record layouts.
///
/// Backed by an `IndexMap` so that a type's position in the map is its
/// [`TypeId`]; lookups by name and by ID are both O(1) and iteration
/// order is registration order.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record type and return its ID.
    ///
    /// `fields` is a list of `(field name, declaration)` pairs; see the
    /// module docs for the declaration notation.
    ///
    /// # Examples
    ///
    /// ```
    /// use simheap_core::{FieldType, TypeRegistry, ValueType};
    ///
    /// let mut registry = TypeRegistry::new();
    /// let node = registry
    ///     .register("Node", &[("value", "int"), ("next", "Node*")])
    ///     .unwrap();
    /// assert_eq!(registry.field_index(node, "next").unwrap(), 1);
    /// let value = &registry.get(node).unwrap().fields()[0];
    /// assert_eq!(value.field_type, FieldType::Value(ValueType::Int));
    /// ```
    pub fn register(&mut self, name: &str, fields: &[(&str, &str)]) -> Result<TypeId, RegistryError> {
        if name.is_empty() || name.contains('*') || ValueType::from_name(name).is_some() {
            return Err(RegistryError::InvalidTypeName {
                name: name.to_string(),
            });
        }
        if self.types.contains_key(name) {
            return Err(RegistryError::DuplicateType {
                name: name.to_string(),
            });
        }
        let id = self.next_id()?;

        let mut descriptors = Vec::with_capacity(fields.len());
        let mut pointer_fields = SmallVec::new();
        let mut offset = 0u32;
        for (index, &(field_name, declaration)) in fields.iter().enumerate() {
            if descriptors.iter().any(|f: &FieldDescriptor| f.name == field_name) {
                return Err(RegistryError::DuplicateField {
                    type_name: name.to_string(),
                    field: field_name.to_string(),
                });
            }
            let field_type = self.parse_declaration(name, id, field_name, declaration)?;
            if field_type.is_pointer() {
                pointer_fields.push(index);
            }
            descriptors.push(FieldDescriptor {
                name: field_name.to_string(),
                field_type,
                offset,
            });
            offset = offset.checked_add(field_type.size()).ok_or_else(|| {
                RegistryError::InvalidFieldType {
                    field: field_name.to_string(),
                    declaration: declaration.to_string(),
                }
            })?;
        }

        self.types.insert(
            name.to_string(),
            TypeDescriptor {
                id,
                name: name.to_string(),
                fields: descriptors,
                payload_size: offset,
                pointer_fields,
            },
        );
        Ok(id)
    }

    /// Look up a type ID by name.
    pub fn type_id(&self, name: &str) -> Result<TypeId, RegistryError> {
        self.types
            .get_index_of(name)
            .map(|i| TypeId(i as u16))
            .ok_or_else(|| RegistryError::UnknownType {
                name: name.to_string(),
            })
    }

    /// Look up a field index by type ID and field name.
    pub fn field_index(&self, type_id: TypeId, field: &str) -> Result<usize, RegistryError> {
        let desc = self.get(type_id)?;
        desc.field_index(field)
            .ok_or_else(|| RegistryError::UnknownField {
                type_name: desc.name.clone(),
                field: field.to_string(),
            })
    }

    /// The descriptor for `type_id`, or `UnknownType`.
    pub fn get(&self, type_id: TypeId) -> Result<&TypeDescriptor, RegistryError> {
        self.descriptor(type_id)
            .ok_or_else(|| RegistryError::UnknownType {
                name: type_id.to_string(),
            })
    }

    /// The descriptor for `type_id`, if registered.
    pub fn descriptor(&self, type_id: TypeId) -> Option<&TypeDescriptor> {
        self.types
            .get_index(type_id.0 as usize)
            .map(|(_, desc)| desc)
    }

    /// The registered name of `type_id`, if any.
    pub fn type_name(&self, type_id: TypeId) -> Option<&str> {
        self.descriptor(type_id).map(|d| d.name())
    }

    /// Whether `type_id` is registered.
    pub fn contains(&self, type_id: TypeId) -> bool {
        (type_id.0 as usize) < self.types.len()
    }

    /// Whether every record type referenced by `element` is registered.
    pub fn is_valid_element(&self, element: ElementType) -> bool {
        match element {
            ElementType::Value(_) => true,
            ElementType::Ptr(t) => self.contains(t),
        }
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over all descriptors in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    fn next_id(&self) -> Result<TypeId, RegistryError> {
        let next = self.types.len();
        if next > TypeId::MAX.0 as usize {
            return Err(RegistryError::TooManyTypes { max: TypeId::MAX });
        }
        Ok(TypeId(next as u16))
    }

    fn parse_declaration(
        &self,
        owner: &str,
        owner_id: TypeId,
        field: &str,
        declaration: &str,
    ) -> Result<FieldType, RegistryError> {
        let invalid = || RegistryError::InvalidFieldType {
            field: field.to_string(),
            declaration: declaration.to_string(),
        };

        let base = declaration.trim_end_matches('*');
        let depth = declaration.len() - base.len();
        if base.is_empty() {
            return Err(invalid());
        }

        if let Some(value) = ValueType::from_name(base) {
            return match depth {
                0 => Ok(FieldType::Value(value)),
                1 => Ok(FieldType::ArrayPtr(ElementType::Value(value))),
                _ => Err(invalid()),
            };
        }

        let record = if base == owner {
            owner_id
        } else {
            self.type_id(base)?
        };
        match depth {
            1 => Ok(FieldType::Ptr(record)),
            2 => Ok(FieldType::ArrayPtr(ElementType::Ptr(record))),
            // Records are never stored inline.
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_registry() -> (TypeRegistry, TypeId, TypeId) {
        let mut reg = TypeRegistry::new();
        let player = reg
            .register("Player", &[("id", "int"), ("minerals", "long")])
            .unwrap();
        let unit = reg
            .register(
                "Unit",
                &[
                    ("hp", "short"),
                    ("position", "numvect"),
                    ("owner", "Player*"),
                    ("path", "intvect*"),
                    ("escorts", "Unit**"),
                ],
            )
            .unwrap();
        (reg, player, unit)
    }

    #[test]
    fn ids_are_sequential() {
        let (reg, player, unit) = unit_registry();
        assert_eq!(player, TypeId(0));
        assert_eq!(unit, TypeId(1));
        assert_eq!(reg.type_id("Unit").unwrap(), unit);
        assert_eq!(reg.type_name(player), Some("Player"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn offsets_follow_declaration_order() {
        let (reg, _, unit) = unit_registry();
        let desc = reg.get(unit).unwrap();
        let offsets: Vec<u32> = desc.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 2, 10, 14, 18]);
        assert_eq!(desc.payload_size(), 22);
    }

    #[test]
    fn declarations_map_to_field_types() {
        let (reg, player, unit) = unit_registry();
        let fields = reg.get(unit).unwrap().fields();
        assert_eq!(fields[0].field_type, FieldType::Value(ValueType::Short));
        assert_eq!(fields[2].field_type, FieldType::Ptr(player));
        assert_eq!(
            fields[3].field_type,
            FieldType::ArrayPtr(ElementType::Value(ValueType::IntVector))
        );
        assert_eq!(
            fields[4].field_type,
            FieldType::ArrayPtr(ElementType::Ptr(unit))
        );
    }

    #[test]
    fn pointer_fields_are_cached_in_order() {
        let (reg, _, unit) = unit_registry();
        let names: Vec<&str> = reg
            .get(unit)
            .unwrap()
            .pointer_fields()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["owner", "path", "escorts"]);
    }

    #[test]
    fn self_reference_is_allowed() {
        let mut reg = TypeRegistry::new();
        let node = reg.register("Node", &[("next", "Node*")]).unwrap();
        assert_eq!(reg.get(node).unwrap().fields()[0].field_type, FieldType::Ptr(node));
    }

    #[test]
    fn duplicate_type_rejected() {
        let (mut reg, _, _) = unit_registry();
        let err = reg.register("Player", &[]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType { .. }));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn forward_reference_to_other_type_rejected() {
        let mut reg = TypeRegistry::new();
        let err = reg.register("A", &[("b", "B*")]).unwrap_err();
        assert_eq!(err, RegistryError::UnknownType { name: "B".into() });
        assert!(reg.is_empty());
    }

    #[test]
    fn unknown_field_lookup() {
        let (reg, player, _) = unit_registry();
        let err = reg.field_index(player, "gas").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownField { .. }));
        assert!(matches!(
            reg.field_index(TypeId(9), "id"),
            Err(RegistryError::UnknownType { .. })
        ));
    }

    #[test]
    fn invalid_declarations_rejected() {
        let mut reg = TypeRegistry::new();
        reg.register("Node", &[]).unwrap();
        for decl in ["Node", "int**", "Node***", "*", ""] {
            let err = reg.register("Bad", &[("f", decl)]).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidFieldType { .. }),
                "declaration {decl:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn invalid_names_rejected() {
        let mut reg = TypeRegistry::new();
        for name in ["", "num", "Node*"] {
            assert!(matches!(
                reg.register(name, &[]),
                Err(RegistryError::InvalidTypeName { .. })
            ));
        }
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut reg = TypeRegistry::new();
        let err = reg
            .register("Pair", &[("a", "int"), ("a", "num")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateField { .. }));
    }

    #[test]
    fn element_validation() {
        let (reg, player, _) = unit_registry();
        assert!(reg.is_valid_element(ElementType::Ptr(player)));
        assert!(!reg.is_valid_element(ElementType::Ptr(TypeId(40))));
        assert!(reg.is_valid_element(ElementType::Value(ValueType::Byte)));
    }
}
