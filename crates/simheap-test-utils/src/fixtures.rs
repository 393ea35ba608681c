//! Reusable heap fixtures.
//!
//! - [`StressFixture`]: a record holding one pointer to an array of every
//!   value type plus a `Next` link, used for churn and round-trip tests.
//! - [`NodeFixture`]: a minimal singly linked `Node { value, next }`.

use std::sync::Arc;

use simheap_arena::{ArrayPtr, ArrayRef, Heap, HeapError, ObjectRef, RecordPtr, SlotType};
use simheap_core::{
    ElementType, HeapValue, IntRect, IntVector, Num, NumRect, NumVector, RegistryError, TypeId,
    TypeRegistry,
};

/// Field declarations of the stress-test record.
pub const TEST_TYPE_FIELDS: [(&str, &str); 10] = [
    ("ByteArray", "byte*"),
    ("ShortArray", "short*"),
    ("IntArray", "int*"),
    ("LongArray", "long*"),
    ("NumArray", "num*"),
    ("IntVectArray", "intvect*"),
    ("NumVectArray", "numvect*"),
    ("IntRectArray", "intrect*"),
    ("NumRectArray", "numrect*"),
    ("Next", "TestType*"),
];

/// Index of the `Next` field.
pub const NEXT: usize = 9;

/// Number of array fields; array field `k` holds `k + 1` elements.
pub const ARRAY_FIELDS: usize = 9;

/// Registry holding `TestType`.
pub struct StressFixture {
    pub registry: Arc<TypeRegistry>,
    pub test_type: TypeId,
}

impl StressFixture {
    pub fn new() -> Result<Self, RegistryError> {
        let mut registry = TypeRegistry::new();
        let test_type = registry.register("TestType", &TEST_TYPE_FIELDS)?;
        Ok(Self {
            registry: Arc::new(registry),
            test_type,
        })
    }

    pub fn heap(&self) -> Heap {
        Heap::new(Arc::clone(&self.registry))
    }

    /// Allocate a `TestType` with all nine arrays populated.
    ///
    /// Element `i` of each array holds `i` (vectors `(i, i+1)`, rectangles
    /// `(i, i+1, i+2, i+3)`). `Next` is null.
    pub fn create(&self, heap: &mut Heap) -> Result<ObjectRef, HeapError> {
        let obj = heap.new_object(self.test_type)?;
        let arrays = [
            filled(heap, 1, |i| i as u8)?,
            filled(heap, 2, |i| i as i16)?,
            filled(heap, 3, |i| i)?,
            filled(heap, 4, i64::from)?,
            filled(heap, 5, Num::from_int)?,
            filled(heap, 6, int_vector)?,
            filled(heap, 7, num_vector)?,
            filled(heap, 8, int_rect)?,
            filled(heap, 9, num_rect)?,
        ];
        for (k, array) in arrays.into_iter().enumerate() {
            let slot = heap.field::<ArrayPtr>(obj, k)?;
            heap.point_to_array(slot, Some(array))?;
        }
        Ok(obj)
    }

    /// Whether every array of `obj` holds the values written by [`create`](Self::create).
    pub fn check(&self, heap: &Heap, obj: ObjectRef) -> Result<bool, HeapError> {
        Ok(holds(heap, self.array(heap, obj, 0)?, 1, |i| i as u8)?
            && holds(heap, self.array(heap, obj, 1)?, 2, |i| i as i16)?
            && holds(heap, self.array(heap, obj, 2)?, 3, |i| i)?
            && holds(heap, self.array(heap, obj, 3)?, 4, i64::from)?
            && holds(heap, self.array(heap, obj, 4)?, 5, Num::from_int)?
            && holds(heap, self.array(heap, obj, 5)?, 6, int_vector)?
            && holds(heap, self.array(heap, obj, 6)?, 7, num_vector)?
            && holds(heap, self.array(heap, obj, 7)?, 8, int_rect)?
            && holds(heap, self.array(heap, obj, 8)?, 9, num_rect)?)
    }

    /// Free the nine arrays of `obj`, then `obj` itself.
    pub fn delete(&self, heap: &mut Heap, obj: ObjectRef) -> Result<(), HeapError> {
        for k in 0..ARRAY_FIELDS {
            let array = self.array(heap, obj, k)?;
            heap.delete_array(array)?;
        }
        heap.delete_object(obj)
    }

    /// Build `len` linked test objects; element 0 is the head.
    pub fn chain(&self, heap: &mut Heap, len: usize) -> Result<Vec<ObjectRef>, HeapError> {
        let mut objects: Vec<ObjectRef> = Vec::with_capacity(len);
        for _ in 0..len {
            let obj = self.create(heap)?;
            if let Some(&prev) = objects.last() {
                self.link(heap, prev, Some(obj))?;
            }
            objects.push(obj);
        }
        Ok(objects)
    }

    pub fn next(&self, heap: &Heap, obj: ObjectRef) -> Result<Option<ObjectRef>, HeapError> {
        heap.deref(heap.field::<RecordPtr>(obj, NEXT)?)
    }

    pub fn link(&self, heap: &mut Heap, from: ObjectRef, to: Option<ObjectRef>) -> Result<(), HeapError> {
        let slot = heap.field::<RecordPtr>(from, NEXT)?;
        heap.point_to(slot, to)
    }

    fn array(&self, heap: &Heap, obj: ObjectRef, k: usize) -> Result<ArrayRef, HeapError> {
        let slot = heap.field::<ArrayPtr>(obj, k)?;
        heap.deref_array(slot)?.ok_or(HeapError::TypeMismatch {
            expected: TEST_TYPE_FIELDS[k].1.to_string(),
            found: "null".to_string(),
        })
    }
}

fn int_vector(i: i32) -> IntVector {
    IntVector::new(i, i + 1)
}

fn num_vector(i: i32) -> NumVector {
    NumVector::new(Num::from_int(i), Num::from_int(i + 1))
}

fn int_rect(i: i32) -> IntRect {
    IntRect::new(i, i + 1, i + 2, i + 3)
}

fn num_rect(i: i32) -> NumRect {
    NumRect::new(
        Num::from_int(i),
        Num::from_int(i + 1),
        Num::from_int(i + 2),
        Num::from_int(i + 3),
    )
}

fn filled<T: HeapValue + SlotType>(
    heap: &mut Heap,
    count: i32,
    value: impl Fn(i32) -> T,
) -> Result<ArrayRef, HeapError> {
    let array = heap.new_array(ElementType::Value(T::VALUE_TYPE), count)?;
    for i in 0..count {
        heap.set_item(array, i as usize, value(i))?;
    }
    Ok(array)
}

fn holds<T: HeapValue + SlotType>(
    heap: &Heap,
    array: ArrayRef,
    count: i32,
    value: impl Fn(i32) -> T,
) -> Result<bool, HeapError> {
    if heap.array_len(array)? != count as u32 {
        return Ok(false);
    }
    for i in 0..count {
        if heap.get_item::<T>(array, i as usize)? != value(i) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Registry holding `Node { value: int, next: Node* }`.
pub struct NodeFixture {
    pub registry: Arc<TypeRegistry>,
    pub node: TypeId,
}

impl NodeFixture {
    pub const VALUE: usize = 0;
    pub const NEXT: usize = 1;

    pub fn new() -> Result<Self, RegistryError> {
        let mut registry = TypeRegistry::new();
        let node = registry.register("Node", &[("value", "int"), ("next", "Node*")])?;
        Ok(Self {
            registry: Arc::new(registry),
            node,
        })
    }

    pub fn heap(&self) -> Heap {
        Heap::new(Arc::clone(&self.registry))
    }

    /// Build a chain of `len` nodes whose values are `0..len`.
    pub fn chain(&self, heap: &mut Heap, len: usize) -> Result<Vec<ObjectRef>, HeapError> {
        let mut nodes: Vec<ObjectRef> = Vec::with_capacity(len);
        for i in 0..len {
            let node = heap.new_object(self.node)?;
            heap.set(node, Self::VALUE, i as i32)?;
            if let Some(&prev) = nodes.last() {
                let slot = heap.field::<RecordPtr>(prev, Self::NEXT)?;
                heap.point_to(slot, Some(node))?;
            }
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Values along the chain starting at `head`, following `next` to null.
    pub fn walk(&self, heap: &Heap, head: ObjectRef) -> Result<Vec<i32>, HeapError> {
        let mut values = Vec::new();
        let mut cursor = Some(head);
        while let Some(node) = cursor {
            values.push(heap.get::<i32>(node, Self::VALUE)?);
            cursor = heap.deref(heap.field::<RecordPtr>(node, Self::NEXT)?)?;
        }
        Ok(values)
    }
}
