//! Typed field and element access.
//!
//! Accessors are created against a live handle and checked against the
//! record's field descriptor (or the array's element type) once, at
//! creation. Reads and writes through an accessor re-check only the
//! owner's generation.

use simheap_core::{Address, FieldType, HeapValue, POINTER_SIZE};

use crate::block::{BlockHeader, HEADER_SIZE};
use crate::error::HeapError;
use crate::handle::{ArrayPtr, ArrayRef, BlockRef, FieldRef, ObjectRef, RecordPtr, SlotType};
use crate::heap::Heap;

fn mismatch<T: SlotType>(declared: FieldType) -> HeapError {
    HeapError::TypeMismatch {
        expected: declared.to_string(),
        found: T::describe(),
    }
}

impl Heap {
    /// Bind an accessor to field `index` of `object`.
    ///
    /// Fails with `UseAfterFree` if the object has been freed,
    /// `NoSuchField` if the index is past the last field, and
    /// `TypeMismatch` if `T` does not match the declared field type.
    pub fn field<T: SlotType>(&self, object: ObjectRef, index: usize) -> Result<FieldRef<T>, HeapError> {
        self.check(object.address, object.generation)?;
        let descriptor = self.registry().get(object.type_id)?;
        let field = descriptor
            .field(index)
            .ok_or_else(|| HeapError::NoSuchField {
                type_name: descriptor.name().to_string(),
                index,
            })?;
        if !T::accepts(field.field_type) {
            return Err(mismatch::<T>(field.field_type));
        }
        Ok(FieldRef::new(
            object.address,
            object.generation,
            Address(object.address.0 + HEADER_SIZE + field.offset),
            field.field_type,
        ))
    }

    /// Bind an accessor to the field called `name`.
    pub fn field_by_name<T: SlotType>(&self, object: ObjectRef, name: &str) -> Result<FieldRef<T>, HeapError> {
        let index = self.registry().field_index(object.type_id, name)?;
        self.field(object, index)
    }

    /// Number of elements in a live array.
    pub fn array_len(&self, array: ArrayRef) -> Result<u32, HeapError> {
        self.check(array.address, array.generation)?;
        Ok(array.len)
    }

    /// Bind an accessor to element `index` of `array`.
    ///
    /// Fails with `IndexOutOfRange` unless `index < len`.
    pub fn item<T: SlotType>(&self, array: ArrayRef, index: usize) -> Result<FieldRef<T>, HeapError> {
        self.check(array.address, array.generation)?;
        let in_range = u32::try_from(index).ok().filter(|&i| i < array.len);
        let Some(i) = in_range else {
            return Err(HeapError::IndexOutOfRange {
                index,
                len: array.len,
            });
        };
        let declared = FieldType::from(array.element);
        if !T::accepts(declared) {
            return Err(mismatch::<T>(declared));
        }
        // `i < len` and `len * size` fitted in the block, so this cannot overflow.
        let offset = i * array.element.size();
        Ok(FieldRef::new(
            array.address,
            array.generation,
            Address(array.address.0 + HEADER_SIZE + offset),
            declared,
        ))
    }

    // ── Values ──────────────────────────────────────────────────

    /// Read the value behind an accessor.
    pub fn read<T: HeapValue>(&self, slot: FieldRef<T>) -> Result<T, HeapError> {
        self.check(slot.owner, slot.generation)?;
        Ok(T::load(self.bytes(slot.address, T::VALUE_TYPE.size())))
    }

    /// Overwrite the value behind an accessor.
    pub fn write<T: HeapValue>(&mut self, slot: FieldRef<T>, value: T) -> Result<(), HeapError> {
        self.check(slot.owner, slot.generation)?;
        value.store(self.bytes_mut(slot.address, T::VALUE_TYPE.size()));
        Ok(())
    }

    /// Read field `index` of `object` in one step.
    pub fn get<T: HeapValue + SlotType>(&self, object: ObjectRef, index: usize) -> Result<T, HeapError> {
        let slot = self.field::<T>(object, index)?;
        self.read(slot)
    }

    /// Write field `index` of `object` in one step.
    pub fn set<T: HeapValue + SlotType>(
        &mut self,
        object: ObjectRef,
        index: usize,
        value: T,
    ) -> Result<(), HeapError> {
        let slot = self.field::<T>(object, index)?;
        self.write(slot, value)
    }

    /// Read element `index` of `array` in one step.
    pub fn get_item<T: HeapValue + SlotType>(&self, array: ArrayRef, index: usize) -> Result<T, HeapError> {
        let slot = self.item::<T>(array, index)?;
        self.read(slot)
    }

    /// Write element `index` of `array` in one step.
    pub fn set_item<T: HeapValue + SlotType>(
        &mut self,
        array: ArrayRef,
        index: usize,
        value: T,
    ) -> Result<(), HeapError> {
        let slot = self.item::<T>(array, index)?;
        self.write(slot, value)
    }

    // ── Pointers ────────────────────────────────────────────────

    fn read_address<T>(&self, slot: FieldRef<T>) -> Result<Address, HeapError> {
        self.check(slot.owner, slot.generation)?;
        let bytes = self.bytes(slot.address, POINTER_SIZE);
        Ok(Address(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
    }

    fn write_address<T>(&mut self, slot: FieldRef<T>, target: Address) -> Result<(), HeapError> {
        self.check(slot.owner, slot.generation)?;
        self.bytes_mut(slot.address, POINTER_SIZE)
            .copy_from_slice(&target.0.to_le_bytes());
        Ok(())
    }

    /// The raw address stored in a pointer slot, [`Address::NULL`] if unset.
    pub fn pointer_address<T>(&self, slot: FieldRef<T>) -> Result<Address, HeapError> {
        if !slot.declared.is_pointer() {
            return Err(HeapError::TypeMismatch {
                expected: slot.declared.to_string(),
                found: "pointer".to_string(),
            });
        }
        self.read_address(slot)
    }

    fn deref_block<T>(&self, slot: FieldRef<T>) -> Result<Option<BlockRef>, HeapError> {
        let target = self.read_address(slot)?;
        if target.is_null() {
            return Ok(None);
        }
        let block = self.resolve(target)?;
        if block.pointer_type() != slot.declared {
            return Err(HeapError::TypeMismatch {
                expected: slot.declared.to_string(),
                found: block.pointer_type().to_string(),
            });
        }
        Ok(Some(block))
    }

    /// Follow a record pointer.
    ///
    /// Returns `None` for null. A pointer left dangling by a free fails
    /// with `UseAfterFree`.
    pub fn deref(&self, slot: FieldRef<RecordPtr>) -> Result<Option<ObjectRef>, HeapError> {
        Ok(self.deref_block(slot)?.and_then(|b| b.as_object()))
    }

    /// Store `target` (or null) in a record pointer slot.
    ///
    /// Fails with `TypeMismatch` if the target's record type is not the
    /// declared pointee. The target's liveness is not checked here.
    pub fn point_to(&mut self, slot: FieldRef<RecordPtr>, target: Option<ObjectRef>) -> Result<(), HeapError> {
        let address = match target {
            None => Address::NULL,
            Some(object) => {
                let pointer = BlockRef::from(object).pointer_type();
                if pointer != slot.declared {
                    return Err(HeapError::TypeMismatch {
                        expected: slot.declared.to_string(),
                        found: pointer.to_string(),
                    });
                }
                object.address
            }
        };
        self.write_address(slot, address)
    }

    /// Follow an array pointer. See [`Heap::deref`].
    pub fn deref_array(&self, slot: FieldRef<ArrayPtr>) -> Result<Option<ArrayRef>, HeapError> {
        Ok(self.deref_block(slot)?.and_then(|b| b.as_array()))
    }

    /// Store `target` (or null) in an array pointer slot.
    ///
    /// The target's element type must equal the declared element type.
    pub fn point_to_array(&mut self, slot: FieldRef<ArrayPtr>, target: Option<ArrayRef>) -> Result<(), HeapError> {
        let address = match target {
            None => Address::NULL,
            Some(array) => {
                let pointer = BlockRef::from(array).pointer_type();
                if pointer != slot.declared {
                    return Err(HeapError::TypeMismatch {
                        expected: slot.declared.to_string(),
                        found: pointer.to_string(),
                    });
                }
                array.address
            }
        };
        self.write_address(slot, address)
    }

    /// The header of the live block behind `block`.
    pub fn header(&self, block: BlockRef) -> Result<BlockHeader, HeapError> {
        self.check(block.address(), block.generation())?;
        Ok(block.header())
    }
}
