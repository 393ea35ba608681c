//! Hashing of state streams for cheap lockstep comparison.
//!
//! Uses FNV-1a (64-bit) over the encoded stream. Streams are canonical
//! (same logical graph, same bytes), so equal hashes are a fast stand-in
//! for byte equality. Not cryptographically secure.

use simheap_arena::{BlockRef, Heap};

use crate::error::SnapshotError;
use crate::writer::save_state;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Feed a single byte into an FNV-1a hash state.
#[inline]
fn fnv1a_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

/// FNV-1a hash of an encoded state stream.
///
/// Returns `FNV_OFFSET` for an empty slice.
pub fn state_hash(stream: &[u8]) -> u64 {
    stream.iter().fold(FNV_OFFSET, |hash, &b| fnv1a_byte(hash, b))
}

/// Hash of the graph reachable from `roots`, as it would be saved.
pub fn heap_hash(heap: &Heap, roots: &[BlockRef]) -> Result<u64, SnapshotError> {
    Ok(state_hash(&save_state(heap, roots)?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use simheap_core::TypeRegistry;

    #[test]
    fn empty_stream_hash_is_fnv_offset() {
        assert_eq!(state_hash(&[]), FNV_OFFSET);
    }

    #[test]
    fn known_vector() {
        // FNV-1a 64 of "a".
        assert_eq!(state_hash(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn byte_order_matters() {
        assert_ne!(state_hash(&[1, 2]), state_hash(&[2, 1]));
    }

    #[test]
    fn heap_hash_tracks_reachable_values() {
        let mut reg = TypeRegistry::new();
        let cell = reg.register("Cell", &[("v", "long")]).unwrap();
        let mut heap = simheap_arena::Heap::new(Arc::new(reg));
        let a = heap.new_object(cell).unwrap();
        let unreachable = heap.new_object(cell).unwrap();

        let before = heap_hash(&heap, &[a.into()]).unwrap();
        heap.set(unreachable, 0, 5i64).unwrap();
        assert_eq!(heap_hash(&heap, &[a.into()]).unwrap(), before);
        heap.set(a, 0, 5i64).unwrap();
        assert_ne!(heap_hash(&heap, &[a.into()]).unwrap(), before);
    }
}
