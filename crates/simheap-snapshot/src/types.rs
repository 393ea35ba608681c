//! In-memory form of a state stream.

use simheap_arena::{BlockHeader, HEADER_SIZE};
use simheap_core::Address;

/// One block as it appears in a state stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockImage {
    /// The block's header.
    pub header: BlockHeader,
    /// Raw payload bytes, pointers already rewritten to stream addresses.
    pub payload: Vec<u8>,
}

impl BlockImage {
    /// Bytes the block occupies in a heap: header plus payload.
    pub fn heap_len(&self) -> u64 {
        u64::from(HEADER_SIZE) + self.payload.len() as u64
    }
}

/// A decoded state stream: the root set plus every reachable block in
/// discovery order.
///
/// Block `i` lives at stream address `FIRST + sum(heap_len of blocks < i)`,
/// the address it would get in a freshly reset heap.
///
/// # Examples
///
/// ```
/// use simheap_arena::BlockHeader;
/// use simheap_core::{Address, ElementType, ValueType};
/// use simheap_snapshot::{BlockImage, StateImage};
///
/// let image = StateImage {
///     roots: vec![Address(4)],
///     blocks: vec![BlockImage {
///         header: BlockHeader::Array {
///             element: ElementType::Value(ValueType::Byte),
///             count: 3,
///         },
///         payload: vec![1, 2, 3],
///     }],
/// };
///
/// assert_eq!(image.addresses().collect::<Vec<_>>(), vec![Address(4)]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateImage {
    /// Root addresses, in the caller's root order.
    pub roots: Vec<Address>,
    /// Reachable blocks, in breadth-first discovery order.
    pub blocks: Vec<BlockImage>,
}

impl StateImage {
    /// Stream address of every block, in block order.
    ///
    /// Addresses past `u32::MAX` saturate; the reader rejects such
    /// streams before using them.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        let mut next = u64::from(Address::FIRST.0);
        self.blocks.iter().map(move |b| {
            let here = next;
            next += b.heap_len();
            Address(u32::try_from(here).unwrap_or(u32::MAX))
        })
    }

    /// One past the last byte the blocks would occupy in a reset heap.
    pub fn end(&self) -> u64 {
        u64::from(Address::FIRST.0) + self.blocks.iter().map(BlockImage::heap_len).sum::<u64>()
    }
}
