//! Capturing heap state: the breadth-first graph walk.
//!
//! The walk starts from the root set and follows every non-null pointer
//! slot (record pointer fields and pointer array elements). Each block is
//! assigned its stream address when first discovered, so discovery order,
//! stream order, and address order coincide. Blocks not reachable from
//! the roots are left out.

use std::io::Write;

use indexmap::IndexMap;
use simheap_arena::{BlockRef, Heap, HeapError};
use simheap_core::{Address, POINTER_SIZE};

use crate::codec::encode_image;
use crate::error::SnapshotError;
use crate::types::{BlockImage, StateImage};

/// Assigns stream addresses in discovery order.
///
/// Keyed by heap address; insertion order doubles as the BFS queue.
struct Discovery {
    order: IndexMap<Address, Address>,
    next: u64,
}

impl Discovery {
    fn new() -> Self {
        Self {
            order: IndexMap::new(),
            next: u64::from(Address::FIRST.0),
        }
    }

    /// Stream address of `block`, discovering it if it is new.
    fn visit(&mut self, heap: &Heap, block: BlockRef) -> Result<Address, SnapshotError> {
        if let Some(&stream) = self.order.get(&block.address()) {
            return Ok(stream);
        }
        let len = block.header().block_len(heap.registry())?;
        let stream = u32::try_from(self.next).map_err(|_| HeapError::CapacityExceeded {
            requested: self.next + u64::from(len),
            capacity: u64::from(u32::MAX),
        })?;
        self.next += u64::from(len);
        self.order.insert(block.address(), Address(stream));
        Ok(Address(stream))
    }
}

/// Walk the graph reachable from `roots` and build its stream image.
///
/// Fails with [`HeapError::UseAfterFree`] if a root is stale or a
/// reachable pointer refers to a freed block, and with
/// [`HeapError::TypeMismatch`] if a pointer slot holds the address of a
/// block of the wrong type.
pub fn capture(heap: &Heap, roots: &[BlockRef]) -> Result<StateImage, SnapshotError> {
    let registry = heap.registry();
    let mut discovery = Discovery::new();

    let mut root_addresses = Vec::with_capacity(roots.len());
    for &root in roots {
        heap.header(root)?;
        root_addresses.push(discovery.visit(heap, root)?);
    }

    let mut blocks = Vec::new();
    loop {
        let Some((&address, _)) = discovery.order.get_index(blocks.len()) else {
            break;
        };
        let block = heap.resolve(address)?;
        let header = block.header();
        let mut payload = heap.payload(block)?.to_vec();

        for (offset, declared) in header.pointer_slots(registry)? {
            let slot = &mut payload[offset as usize..(offset + POINTER_SIZE) as usize];
            let target = Address(u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]));
            if target.is_null() {
                continue;
            }
            let pointee = heap.resolve(target)?;
            if pointee.pointer_type() != declared {
                return Err(HeapError::TypeMismatch {
                    expected: declared.to_string(),
                    found: pointee.pointer_type().to_string(),
                }
                .into());
            }
            let stream = discovery.visit(heap, pointee)?;
            slot.copy_from_slice(&stream.0.to_le_bytes());
        }

        blocks.push(BlockImage { header, payload });
    }

    Ok(StateImage {
        roots: root_addresses,
        blocks,
    })
}

/// Serialize the graph reachable from `roots` into `w`.
pub fn write_state<W: Write>(heap: &Heap, roots: &[BlockRef], mut w: W) -> Result<(), SnapshotError> {
    let image = capture(heap, roots)?;
    encode_image(&mut w, &image)?;
    tracing::debug!(
        roots = image.roots.len(),
        blocks = image.blocks.len(),
        "wrote heap state"
    );
    Ok(())
}

/// Serialize the graph reachable from `roots` into a byte vector.
///
/// Two heaps that performed the same operations produce identical bytes
/// for the same root set, and saving twice without mutation in between
/// yields identical bytes.
pub fn save_state(heap: &Heap, roots: &[BlockRef]) -> Result<Vec<u8>, SnapshotError> {
    let image = capture(heap, roots)?;
    let mut buf = Vec::new();
    encode_image(&mut buf, &image)?;
    tracing::debug!(
        roots = image.roots.len(),
        blocks = image.blocks.len(),
        bytes = buf.len(),
        "saved heap state"
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use simheap_arena::{ArrayPtr, BlockHeader, RecordPtr};
    use simheap_core::{ElementType, TypeId, TypeRegistry, ValueType};

    fn setup() -> (Heap, TypeId) {
        let mut reg = TypeRegistry::new();
        let node = reg
            .register("Node", &[("value", "int"), ("next", "Node*"), ("data", "short*")])
            .unwrap();
        (Heap::new(Arc::new(reg)), node)
    }

    #[test]
    fn unreachable_blocks_are_dropped_and_addresses_compacted() {
        let (mut heap, node) = setup();
        let _garbage = heap.new_object(node).unwrap();
        let a = heap.new_object(node).unwrap();
        let _more_garbage = heap.new_array(ElementType::Value(ValueType::Long), 10).unwrap();
        let b = heap.new_object(node).unwrap();
        heap.set(a, 0, 1i32).unwrap();
        heap.set(b, 0, 2i32).unwrap();
        let next = heap.field::<RecordPtr>(a, 1).unwrap();
        heap.point_to(next, Some(b)).unwrap();

        let image = capture(&heap, &[a.into()]).unwrap();
        assert_eq!(image.roots, vec![Address(4)]);
        assert_eq!(image.blocks.len(), 2);
        // Node payload: int + two pointers = 12 bytes; block = 20 bytes.
        assert_eq!(image.addresses().collect::<Vec<_>>(), vec![Address(4), Address(24)]);
        assert_eq!(&image.blocks[0].payload[4..8], &24u32.to_le_bytes());
        assert_eq!(&image.blocks[1].payload[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn walk_is_breadth_first() {
        let (mut heap, node) = setup();
        // root -> child (via next), root -> data (via data array pointer),
        // child -> grandchild. BFS order: root, child, data, grandchild.
        let root = heap.new_object(node).unwrap();
        let child = heap.new_object(node).unwrap();
        let grandchild = heap.new_object(node).unwrap();
        let data = heap.new_array(ElementType::Value(ValueType::Short), 2).unwrap();

        let f = heap.field::<RecordPtr>(root, 1).unwrap();
        heap.point_to(f, Some(child)).unwrap();
        let f = heap.field::<ArrayPtr>(root, 2).unwrap();
        heap.point_to_array(f, Some(data)).unwrap();
        let f = heap.field::<RecordPtr>(child, 1).unwrap();
        heap.point_to(f, Some(grandchild)).unwrap();

        let image = capture(&heap, &[root.into()]).unwrap();
        let headers: Vec<BlockHeader> = image.blocks.iter().map(|b| b.header).collect();
        assert_eq!(
            headers,
            vec![
                BlockHeader::Object { type_id: node },
                BlockHeader::Object { type_id: node },
                BlockHeader::Array {
                    element: ElementType::Value(ValueType::Short),
                    count: 2
                },
                BlockHeader::Object { type_id: node },
            ]
        );
    }

    #[test]
    fn cycles_and_shared_targets_are_emitted_once() {
        let (mut heap, node) = setup();
        let a = heap.new_object(node).unwrap();
        let b = heap.new_object(node).unwrap();
        let f = heap.field::<RecordPtr>(a, 1).unwrap();
        heap.point_to(f, Some(b)).unwrap();
        let f = heap.field::<RecordPtr>(b, 1).unwrap();
        heap.point_to(f, Some(a)).unwrap();

        let image = capture(&heap, &[a.into(), b.into(), a.into()]).unwrap();
        assert_eq!(image.blocks.len(), 2);
        assert_eq!(image.roots, vec![Address(4), Address(24), Address(4)]);
        assert_eq!(&image.blocks[1].payload[4..8], &4u32.to_le_bytes());
    }

    #[test]
    fn pointer_arrays_are_followed() {
        let (mut heap, node) = setup();
        let arr = heap.new_array(ElementType::Ptr(node), 3).unwrap();
        let x = heap.new_object(node).unwrap();
        let slot = heap.item::<RecordPtr>(arr, 2).unwrap();
        heap.point_to(slot, Some(x)).unwrap();

        let image = capture(&heap, &[arr.into()]).unwrap();
        assert_eq!(image.blocks.len(), 2);
        // Array block: 8 header + 12 payload = 20 bytes.
        assert_eq!(&image.blocks[0].payload[8..12], &24u32.to_le_bytes());
    }

    #[test]
    fn stale_root_rejected() {
        let (mut heap, node) = setup();
        let a = heap.new_object(node).unwrap();
        heap.delete_object(a).unwrap();
        assert!(matches!(
            capture(&heap, &[a.into()]),
            Err(SnapshotError::Heap(HeapError::UseAfterFree { .. }))
        ));
    }

    #[test]
    fn dangling_pointer_rejected() {
        let (mut heap, node) = setup();
        let a = heap.new_object(node).unwrap();
        let b = heap.new_object(node).unwrap();
        let f = heap.field::<RecordPtr>(a, 1).unwrap();
        heap.point_to(f, Some(b)).unwrap();
        heap.delete_object(b).unwrap();
        assert!(matches!(
            save_state(&heap, &[a.into()]),
            Err(SnapshotError::Heap(HeapError::UseAfterFree { .. }))
        ));
    }

    #[test]
    fn empty_root_set_saves_header_only() {
        let (mut heap, node) = setup();
        let _a = heap.new_object(node).unwrap();
        assert_eq!(save_state(&heap, &[]).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn write_state_matches_save_state() {
        let (mut heap, node) = setup();
        let a = heap.new_object(node).unwrap();
        heap.set(a, 0, -5i32).unwrap();
        let mut streamed = Vec::new();
        write_state(&heap, &[a.into()], &mut streamed).unwrap();
        assert_eq!(streamed, save_state(&heap, &[a.into()]).unwrap());
    }
}
