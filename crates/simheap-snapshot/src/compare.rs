//! Stream comparison for lockstep desync diagnostics.
//!
//! Byte comparison first; on mismatch both streams are decoded and walked
//! in order to name the first point where they disagree.

use std::fmt;

use simheap_arena::BlockHeader;
use simheap_core::Address;

use crate::codec::decode_image;
use crate::error::SnapshotError;

/// The first point at which two state streams disagree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Divergence {
    /// The streams have different numbers of roots.
    RootCount {
        /// Roots in the recorded stream.
        recorded: usize,
        /// Roots in the replayed stream.
        replayed: usize,
    },
    /// A root points at a different block.
    Root {
        /// Position in the root list.
        index: usize,
        /// Address in the recorded stream.
        recorded: Address,
        /// Address in the replayed stream.
        replayed: Address,
    },
    /// Two blocks at the same position have different headers.
    Header {
        /// Block position in discovery order.
        block: usize,
        /// Stream address of the block.
        address: Address,
        /// Header in the recorded stream.
        recorded: BlockHeader,
        /// Header in the replayed stream.
        replayed: BlockHeader,
    },
    /// Two blocks with equal headers differ in their payload.
    Payload {
        /// Block position in discovery order.
        block: usize,
        /// Stream address of the block.
        address: Address,
        /// Byte offset of the first difference within the payload.
        byte_offset: usize,
        /// Byte in the recorded stream.
        recorded: u8,
        /// Byte in the replayed stream.
        replayed: u8,
    },
    /// Two blocks with equal headers carry payloads of different lengths.
    ///
    /// Only records can differ this way: their stream length is not
    /// implied by the header. The shorter payload is a prefix of the
    /// longer one.
    PayloadLength {
        /// Block position in discovery order.
        block: usize,
        /// Stream address of the block.
        address: Address,
        /// Payload bytes in the recorded stream.
        recorded: usize,
        /// Payload bytes in the replayed stream.
        replayed: usize,
    },
    /// One stream has more reachable blocks than the other.
    BlockCount {
        /// Blocks in the recorded stream.
        recorded: usize,
        /// Blocks in the replayed stream.
        replayed: usize,
    },
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootCount { recorded, replayed } => {
                write!(f, "root count differs: recorded={recorded}, replayed={replayed}")
            }
            Self::Root {
                index,
                recorded,
                replayed,
            } => write!(f, "root {index} differs: recorded={recorded}, replayed={replayed}"),
            Self::Header {
                block,
                address,
                recorded,
                replayed,
            } => write!(
                f,
                "block {block} at {address}: header recorded={recorded:?}, replayed={replayed:?}"
            ),
            Self::Payload {
                block,
                address,
                byte_offset,
                recorded,
                replayed,
            } => write!(
                f,
                "block {block} at {address}, payload byte {byte_offset}: \
                 recorded={recorded:#04x}, replayed={replayed:#04x}"
            ),
            Self::PayloadLength {
                block,
                address,
                recorded,
                replayed,
            } => write!(
                f,
                "block {block} at {address}: payload length recorded={recorded}, replayed={replayed}"
            ),
            Self::BlockCount { recorded, replayed } => {
                write!(f, "block count differs: recorded={recorded}, replayed={replayed}")
            }
        }
    }
}

/// Compare two encoded state streams.
///
/// Returns `Ok(None)` exactly when the streams are byte-identical.
/// Otherwise decodes both and reports the first divergence in stream
/// order. Fails with `CorruptStream` if either stream cannot be decoded.
pub fn compare_states(recorded: &[u8], replayed: &[u8]) -> Result<Option<Divergence>, SnapshotError> {
    if recorded == replayed {
        return Ok(None);
    }

    let rec = decode_image(&mut &recorded[..])?;
    let rep = decode_image(&mut &replayed[..])?;

    if rec.roots.len() != rep.roots.len() {
        return Ok(Some(Divergence::RootCount {
            recorded: rec.roots.len(),
            replayed: rep.roots.len(),
        }));
    }
    for (index, (&r, &p)) in rec.roots.iter().zip(&rep.roots).enumerate() {
        if r != p {
            return Ok(Some(Divergence::Root {
                index,
                recorded: r,
                replayed: p,
            }));
        }
    }

    let blocks = rec.blocks.iter().zip(&rep.blocks);
    for (block, ((r, p), address)) in blocks.zip(rec.addresses()).enumerate() {
        if r.header != p.header {
            return Ok(Some(Divergence::Header {
                block,
                address,
                recorded: r.header,
                replayed: p.header,
            }));
        }
        let diff = r.payload.iter().zip(&p.payload).position(|(a, b)| a != b);
        if let Some(byte_offset) = diff {
            return Ok(Some(Divergence::Payload {
                block,
                address,
                byte_offset,
                recorded: r.payload[byte_offset],
                replayed: p.payload[byte_offset],
            }));
        }
        if r.payload.len() != p.payload.len() {
            return Ok(Some(Divergence::PayloadLength {
                block,
                address,
                recorded: r.payload.len(),
                replayed: p.payload.len(),
            }));
        }
    }

    if rec.blocks.len() != rep.blocks.len() {
        return Ok(Some(Divergence::BlockCount {
            recorded: rec.blocks.len(),
            replayed: rep.blocks.len(),
        }));
    }

    // Equal images encode to equal bytes, so differing input must have
    // decoded to different images above.
    Err(SnapshotError::corrupt(
        "streams differ but decode to identical images",
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::writer::save_state;
    use simheap_arena::{Heap, RecordPtr};
    use simheap_core::{TypeId, TypeRegistry};

    fn setup() -> (Heap, TypeId) {
        let mut reg = TypeRegistry::new();
        let unit = reg
            .register("Unit", &[("hp", "int"), ("next", "Unit*")])
            .unwrap();
        (Heap::new(Arc::new(reg)), unit)
    }

    #[test]
    fn identical_streams_match() {
        let (mut heap, unit) = setup();
        let a = heap.new_object(unit).unwrap();
        let bytes = save_state(&heap, &[a.into()]).unwrap();
        assert_eq!(compare_states(&bytes, &bytes.clone()).unwrap(), None);
    }

    #[test]
    fn payload_divergence_located() {
        let (mut heap, unit) = setup();
        let a = heap.new_object(unit).unwrap();
        let b = heap.new_object(unit).unwrap();
        let f = heap.field::<RecordPtr>(a, 1).unwrap();
        heap.point_to(f, Some(b)).unwrap();
        let recorded = save_state(&heap, &[a.into()]).unwrap();
        heap.set(b, 0, 3i32).unwrap();
        let replayed = save_state(&heap, &[a.into()]).unwrap();

        let divergence = compare_states(&recorded, &replayed).unwrap().unwrap();
        assert_eq!(
            divergence,
            Divergence::Payload {
                block: 1,
                address: Address(20),
                byte_offset: 0,
                recorded: 0,
                replayed: 3,
            }
        );
        assert!(divergence.to_string().contains("payload byte 0"));
    }

    #[test]
    fn extra_block_reported_as_block_count() {
        let (mut heap, unit) = setup();
        let a = heap.new_object(unit).unwrap();
        let recorded = save_state(&heap, &[a.into()]).unwrap();
        let b = heap.new_object(unit).unwrap();
        let f = heap.field::<RecordPtr>(a, 1).unwrap();
        heap.point_to(f, Some(b)).unwrap();
        let replayed = save_state(&heap, &[a.into()]).unwrap();

        // The root's pointer field changes first.
        assert!(matches!(
            compare_states(&recorded, &replayed).unwrap(),
            Some(Divergence::Payload { block: 0, byte_offset: 4, .. })
        ));
    }

    #[test]
    fn root_count_difference_reported_first() {
        let (mut heap, unit) = setup();
        let a = heap.new_object(unit).unwrap();
        let one = save_state(&heap, &[a.into()]).unwrap();
        let two = save_state(&heap, &[a.into(), a.into()]).unwrap();
        assert_eq!(
            compare_states(&one, &two).unwrap(),
            Some(Divergence::RootCount {
                recorded: 1,
                replayed: 2
            })
        );
    }

    #[test]
    fn trailing_block_reported() {
        let (mut heap, unit) = setup();
        let a = heap.new_object(unit).unwrap();
        let b = heap.new_object(unit).unwrap();
        let short = save_state(&heap, &[a.into()]).unwrap();
        let f = heap.field::<RecordPtr>(a, 1).unwrap();
        heap.point_to(f, Some(b)).unwrap();
        let mut long = save_state(&heap, &[a.into()]).unwrap();
        // Undo the pointer change in the encoded root so only the block count differs.
        long[4 + 4 + 7 + 4..4 + 4 + 7 + 8].copy_from_slice(&[0, 0, 0, 0]);
        assert_eq!(
            compare_states(&short, &long).unwrap(),
            Some(Divergence::BlockCount {
                recorded: 1,
                replayed: 2
            })
        );
    }

    #[test]
    fn record_payload_length_difference_reported() {
        // Same header (record type 0), payloads 4 and 8 bytes long with a
        // common prefix.
        #[rustfmt::skip]
        let recorded: Vec<u8> = vec![
            1, 0, 0, 0, 4, 0, 0, 0,
            0, 0, 0, 4, 0, 0, 0, 1, 2, 3, 4,
        ];
        #[rustfmt::skip]
        let replayed: Vec<u8> = vec![
            1, 0, 0, 0, 4, 0, 0, 0,
            0, 0, 0, 8, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8,
        ];
        let divergence = compare_states(&recorded, &replayed).unwrap();
        assert_eq!(
            divergence,
            Some(Divergence::PayloadLength {
                block: 0,
                address: Address(4),
                recorded: 4,
                replayed: 8,
            })
        );
        assert!(divergence.unwrap().to_string().contains("payload length"));
    }

    #[test]
    fn differing_streams_never_compare_equal() {
        let (mut heap, unit) = setup();
        let a = heap.new_object(unit).unwrap();
        heap.set(a, 0, 12i32).unwrap();
        let bytes = save_state(&heap, &[a.into()]).unwrap();
        for i in 4..bytes.len() {
            let mut other = bytes.clone();
            other[i] ^= 0x01;
            // Either a located divergence or a decode error, never "in sync".
            assert!(!matches!(compare_states(&bytes, &other), Ok(None)), "flip at {i}");
        }
    }

    #[test]
    fn corrupt_input_is_an_error() {
        assert!(matches!(
            compare_states(&[1, 0, 0], &[0, 0, 0, 0]),
            Err(SnapshotError::CorruptStream { .. })
        ));
    }
}
