//! Restoring heap state from a stream.
//!
//! Loading is all-or-nothing. The whole image is validated against the
//! heap's registry first; only then is the heap reset and rebuilt. The
//! rebuild allocates blocks in stream order, so a reset heap hands out
//! exactly the stream's addresses, but pointers are still translated
//! through the allocation results rather than trusted.

use std::io::Read;
use std::sync::Arc;

use indexmap::IndexMap;
use simheap_arena::{BlockHeader, BlockRef, Heap, HeapError};
use simheap_core::{Address, TypeRegistry, POINTER_SIZE};

use crate::codec::decode_image;
use crate::error::SnapshotError;
use crate::types::StateImage;

fn read_pointer(payload: &[u8], offset: u32) -> Address {
    let at = offset as usize;
    Address(u32::from_le_bytes([
        payload[at],
        payload[at + 1],
        payload[at + 2],
        payload[at + 3],
    ]))
}

/// Check that `image` describes a consistent heap under `registry`.
///
/// Rejects unknown type ids and element types, payloads whose length
/// disagrees with their header, roots that are not block starts, and
/// pointers that do not land on the start of a block of the declared
/// type.
pub fn validate(image: &StateImage, registry: &TypeRegistry) -> Result<(), SnapshotError> {
    if image.end() > u64::from(u32::MAX) {
        return Err(SnapshotError::corrupt(format!(
            "blocks span {} bytes, past the 32-bit address space",
            image.end()
        )));
    }

    let starts: IndexMap<Address, usize> = image
        .addresses()
        .enumerate()
        .map(|(i, address)| (address, i))
        .collect();

    for (i, block) in image.blocks.iter().enumerate() {
        match block.header {
            BlockHeader::Object { type_id } => {
                if !registry.contains(type_id) {
                    return Err(SnapshotError::corrupt(format!(
                        "block {i}: unknown type id {type_id}"
                    )));
                }
            }
            BlockHeader::Array { element, count } => {
                if !registry.is_valid_element(element) {
                    return Err(SnapshotError::corrupt(format!(
                        "block {i}: unknown element type {element}"
                    )));
                }
                if i32::try_from(count).is_err() {
                    return Err(SnapshotError::corrupt(format!(
                        "block {i}: element count {count} out of range"
                    )));
                }
            }
        }
        let expected = block
            .header
            .payload_size(registry)
            .map_err(|e| SnapshotError::corrupt(format!("block {i}: {e}")))?;
        if block.payload.len() as u64 != u64::from(expected) {
            return Err(SnapshotError::corrupt(format!(
                "block {i}: payload is {} bytes, header implies {expected}",
                block.payload.len()
            )));
        }
    }

    for (j, root) in image.roots.iter().enumerate() {
        if !starts.contains_key(root) {
            return Err(SnapshotError::corrupt(format!(
                "root {j} at {root} is not a block start"
            )));
        }
    }

    for (i, block) in image.blocks.iter().enumerate() {
        let slots = block
            .header
            .pointer_slots(registry)
            .map_err(|e| SnapshotError::corrupt(format!("block {i}: {e}")))?;
        for (offset, declared) in slots {
            let target = read_pointer(&block.payload, offset);
            if target.is_null() {
                continue;
            }
            let Some(&j) = starts.get(&target) else {
                return Err(SnapshotError::corrupt(format!(
                    "block {i} offset {offset}: pointer {target} is not a block start"
                )));
            };
            let found = image.blocks[j].header.pointer_type();
            if found != declared {
                return Err(SnapshotError::corrupt(format!(
                    "block {i} offset {offset}: pointer to {found} stored in {declared} slot"
                )));
            }
        }
    }

    Ok(())
}

/// Rebuild `heap` from a validated image, returning the roots in order.
///
/// The heap is reset first, invalidating every outstanding handle. On
/// error the heap is left untouched.
pub fn restore(heap: &mut Heap, image: &StateImage) -> Result<Vec<BlockRef>, SnapshotError> {
    let registry = Arc::clone(heap.registry());
    validate(image, &registry)?;
    let capacity = u64::from(heap.config().max_capacity);
    if image.end() > capacity {
        return Err(HeapError::CapacityExceeded {
            requested: image.end(),
            capacity,
        }
        .into());
    }

    heap.reset();

    let mut placed: IndexMap<Address, BlockRef> = IndexMap::with_capacity(image.blocks.len());
    for (stream, block) in image.addresses().zip(&image.blocks) {
        let handle: BlockRef = match block.header {
            BlockHeader::Object { type_id } => heap.new_object(type_id)?.into(),
            BlockHeader::Array { element, count } => {
                // Validated to fit in i32 above.
                let count = i32::try_from(count).map_err(|_| HeapError::InvalidLength {
                    count: i64::from(count),
                })?;
                heap.new_array(element, count)?.into()
            }
        };
        placed.insert(stream, handle);
    }

    for (block, &handle) in image.blocks.iter().zip(placed.values()) {
        let slots = block.header.pointer_slots(&registry)?;
        let payload = heap.payload_mut(handle)?;
        payload.copy_from_slice(&block.payload);
        for (offset, _) in slots {
            let stream = read_pointer(payload, offset);
            if stream.is_null() {
                continue;
            }
            let target = placed
                .get(&stream)
                .ok_or_else(|| SnapshotError::corrupt(format!("dangling pointer {stream}")))?;
            let at = offset as usize;
            payload[at..at + POINTER_SIZE as usize].copy_from_slice(&target.address().0.to_le_bytes());
        }
    }

    image
        .roots
        .iter()
        .map(|root| {
            placed
                .get(root)
                .copied()
                .ok_or_else(|| SnapshotError::corrupt(format!("root {root} is not a block start")))
        })
        .collect()
}

fn finish(
    result: Result<Vec<BlockRef>, SnapshotError>,
    image: Option<&StateImage>,
) -> Result<Vec<BlockRef>, SnapshotError> {
    match &result {
        Ok(roots) => tracing::debug!(
            roots = roots.len(),
            blocks = image.map_or(0, |i| i.blocks.len()),
            "loaded heap state"
        ),
        Err(SnapshotError::CorruptStream { detail }) => {
            tracing::warn!(%detail, "rejected corrupt state stream");
        }
        Err(_) => {}
    }
    result
}

/// Replace the contents of `heap` with the state encoded in `r`.
///
/// Reads `r` to the end. See [`load_state`].
pub fn read_state<R: Read>(heap: &mut Heap, mut r: R) -> Result<Vec<BlockRef>, SnapshotError> {
    let image = match decode_image(&mut r) {
        Ok(image) => image,
        Err(e) => return finish(Err(e), None),
    };
    let result = restore(heap, &image);
    finish(result, Some(&image))
}

/// Replace the contents of `heap` with the state encoded in `bytes`,
/// returning the root handles in their saved order.
///
/// A stream that is truncated, names unknown types, or holds pointers
/// that do not resolve to blocks of the declared type fails with
/// [`SnapshotError::CorruptStream`] and leaves the heap unchanged.
pub fn load_state(heap: &mut Heap, bytes: &[u8]) -> Result<Vec<BlockRef>, SnapshotError> {
    read_state(heap, bytes)
}
