//! Binary encode/decode for state streams.
//!
//! All integers are little-endian. The format has no magic, version, or
//! footer: a root table followed by self-describing blocks until the end
//! of the stream.
//!
//! ```text
//! [root_count u32] [root u32] * root_count
//! ( [kind u8] [tag u16] [length_or_count u32] [payload ...] ) *
//! ```
//!
//! `kind` is 0 for a record (tag = type id, length = payload bytes) and 1
//! for an array (tag = element tag, count = element count).

use std::io::{self, Read, Write};

use simheap_arena::BlockHeader;
use simheap_core::{Address, ElementType, TypeId};

use crate::error::SnapshotError;
use crate::types::{BlockImage, StateImage};

const KIND_OBJECT: u8 = 0;
const KIND_ARRAY: u8 = 1;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), SnapshotError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u16.
pub fn write_u16_le(w: &mut dyn Write, v: u16) -> Result<(), SnapshotError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), SnapshotError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

fn read_exact(r: &mut dyn Read, buf: &mut [u8]) -> Result<(), SnapshotError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            SnapshotError::corrupt("unexpected end of stream")
        } else {
            SnapshotError::Io(e)
        }
    })
}

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, SnapshotError> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u16.
pub fn read_u16_le(r: &mut dyn Read) -> Result<u16, SnapshotError> {
    let mut buf = [0u8; 2];
    read_exact(r, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, SnapshotError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read exactly `len` bytes without trusting `len` for preallocation.
fn read_payload(r: &mut dyn Read, len: u64) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = Vec::new();
    (&mut *r).take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(SnapshotError::corrupt(format!(
            "truncated payload: got {} of {len} bytes",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Read the kind byte of the next block, or `None` on clean EOF.
fn read_kind(r: &mut dyn Read) -> Result<Option<u8>, SnapshotError> {
    let mut buf = [0u8; 1];
    loop {
        match r.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SnapshotError::Io(e)),
        }
    }
}

// ── Image encode/decode ─────────────────────────────────────────

/// Encode a state image.
pub fn encode_image(w: &mut dyn Write, image: &StateImage) -> Result<(), SnapshotError> {
    let root_count = u32::try_from(image.roots.len())
        .map_err(|_| SnapshotError::corrupt("more than u32::MAX roots"))?;
    write_u32_le(w, root_count)?;
    for root in &image.roots {
        write_u32_le(w, root.0)?;
    }

    for block in &image.blocks {
        match block.header {
            BlockHeader::Object { type_id } => {
                let len = u32::try_from(block.payload.len())
                    .map_err(|_| SnapshotError::corrupt("record payload exceeds u32::MAX bytes"))?;
                write_u8(w, KIND_OBJECT)?;
                write_u16_le(w, type_id.0)?;
                write_u32_le(w, len)?;
            }
            BlockHeader::Array { element, count } => {
                write_u8(w, KIND_ARRAY)?;
                write_u16_le(w, element.tag())?;
                write_u32_le(w, count)?;
            }
        }
        w.write_all(&block.payload)?;
    }
    Ok(())
}

/// Decode a state image, reading until end of stream.
///
/// Checks framing only: known kinds, known element tags, and complete
/// payloads. Type ids and pointers are checked against a heap when the
/// image is loaded.
pub fn decode_image(r: &mut dyn Read) -> Result<StateImage, SnapshotError> {
    let root_count = read_u32_le(r)?;
    let mut roots = Vec::with_capacity(root_count.min(1024) as usize);
    for _ in 0..root_count {
        roots.push(Address(read_u32_le(r)?));
    }

    let mut blocks = Vec::new();
    while let Some(kind) = read_kind(r)? {
        let tag = read_u16_le(r)?;
        let length = read_u32_le(r)?;
        let block = match kind {
            KIND_OBJECT => BlockImage {
                header: BlockHeader::Object {
                    type_id: TypeId(tag),
                },
                payload: read_payload(r, u64::from(length))?,
            },
            KIND_ARRAY => {
                let element = ElementType::from_tag(tag).ok_or_else(|| {
                    SnapshotError::corrupt(format!(
                        "block {}: unknown element tag {tag:#06x}",
                        blocks.len()
                    ))
                })?;
                let bytes = u64::from(length) * u64::from(element.size());
                BlockImage {
                    header: BlockHeader::Array {
                        element,
                        count: length,
                    },
                    payload: read_payload(r, bytes)?,
                }
            }
            other => {
                return Err(SnapshotError::corrupt(format!(
                    "block {}: unknown block kind {other}",
                    blocks.len()
                )))
            }
        };
        blocks.push(block);
    }

    Ok(StateImage { roots, blocks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use simheap_core::ValueType;

    fn sample() -> StateImage {
        StateImage {
            roots: vec![Address(4), Address(20)],
            blocks: vec![
                BlockImage {
                    header: BlockHeader::Object { type_id: TypeId(2) },
                    payload: vec![1, 0, 0, 0, 20, 0, 0, 0],
                },
                BlockImage {
                    header: BlockHeader::Array {
                        element: ElementType::Value(ValueType::Short),
                        count: 2,
                    },
                    payload: vec![0xFF, 0xFF, 7, 0],
                },
            ],
        }
    }

    #[test]
    fn wire_layout_is_exact() {
        let mut buf = Vec::new();
        encode_image(&mut buf, &sample()).unwrap();
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            2, 0, 0, 0,             // root count
            4, 0, 0, 0,             // root 0
            20, 0, 0, 0,            // root 1
            0, 2, 0, 8, 0, 0, 0,    // object, type 2, 8 payload bytes
            1, 0, 0, 0, 20, 0, 0, 0,
            1, 1, 0, 2, 0, 0, 0,    // array of short, 2 elements
            0xFF, 0xFF, 7, 0,
        ];
        assert_eq!(buf, expected);
        assert_eq!(decode_image(&mut buf.as_slice()).unwrap(), sample());
    }

    #[test]
    fn empty_root_set_has_no_blocks() {
        let mut buf = Vec::new();
        encode_image(&mut buf, &StateImage::default()).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);
        assert_eq!(decode_image(&mut buf.as_slice()).unwrap(), StateImage::default());
    }

    #[test]
    fn pointer_arrays_use_flagged_tag() {
        let image = StateImage {
            roots: vec![],
            blocks: vec![BlockImage {
                header: BlockHeader::Array {
                    element: ElementType::Ptr(TypeId(3)),
                    count: 1,
                },
                payload: vec![0; 4],
            }],
        };
        let mut buf = Vec::new();
        encode_image(&mut buf, &image).unwrap();
        assert_eq!(&buf[4..7], &[1, 0x03, 0x80]);
        assert_eq!(decode_image(&mut buf.as_slice()).unwrap(), image);
    }

    #[test]
    fn empty_input_is_corrupt() {
        let err = decode_image(&mut &[0u8; 0][..]).unwrap_err();
        assert!(matches!(err, SnapshotError::CorruptStream { .. }));
    }

    #[test]
    fn truncation_anywhere_is_corrupt() {
        let mut buf = Vec::new();
        encode_image(&mut buf, &sample()).unwrap();
        // Cutting at a block boundary yields a shorter valid stream;
        // every other cut must be rejected.
        let boundaries = [12, 27];
        for cut in 0..buf.len() {
            let result = decode_image(&mut &buf[..cut]);
            if boundaries.contains(&cut) {
                assert!(result.is_ok(), "cut at {cut} should decode");
            } else {
                assert!(
                    matches!(result, Err(SnapshotError::CorruptStream { .. })),
                    "cut at {cut} should be corrupt"
                );
            }
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        let buf = [0, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0];
        let err = decode_image(&mut &buf[..]).unwrap_err();
        assert!(err.to_string().contains("unknown block kind 7"));
    }

    #[test]
    fn unknown_element_tag_rejected() {
        let buf = [0, 0, 0, 0, 1, 42, 0, 0, 0, 0, 0];
        let err = decode_image(&mut &buf[..]).unwrap_err();
        assert!(err.to_string().contains("unknown element tag"));
    }

    #[test]
    fn huge_declared_length_does_not_preallocate() {
        // Claims a 4 GiB record payload but supplies 2 bytes.
        let buf = [0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 1, 2];
        assert!(matches!(
            decode_image(&mut &buf[..]),
            Err(SnapshotError::CorruptStream { .. })
        ));
    }
}
