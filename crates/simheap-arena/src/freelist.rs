//! Address-ordered free list with an unbounded tail.
//!
//! Free ranges are kept in a doubly linked list sorted by address. The
//! nodes live in a slab (`Vec<FreeNode>` plus a vacancy stack) and link
//! to each other by index, so the list never holds references into
//! itself.
//!
//! Invariants maintained by every operation:
//!
//! - the list is never empty and its last node is the only
//!   [`Extent::Unbounded`] node (the tail);
//! - no two nodes are address-contiguous (touching ranges are merged).

use simheap_core::Address;

/// Length of a free range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extent {
    /// A finite range of the given number of bytes.
    Bounded(u32),
    /// The tail: everything from the start address to the end of the
    /// address space.
    Unbounded,
}

/// A free range, as reported by [`FreeList::spans`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeSpan {
    /// First free byte.
    pub address: Address,
    /// Length of the range.
    pub extent: Extent,
}

impl FreeSpan {
    /// Length in bytes, with `-1` standing for the unbounded tail.
    pub fn length(&self) -> i64 {
        match self.extent {
            Extent::Bounded(len) => i64::from(len),
            Extent::Unbounded => -1,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct FreeNode {
    span: FreeSpan,
    prev: Option<usize>,
    next: Option<usize>,
}

/// First-fit free list over a 32-bit address space.
pub struct FreeList {
    nodes: Vec<FreeNode>,
    /// Slab indices available for reuse.
    vacant: Vec<usize>,
    head: usize,
    tail: usize,
    /// Exclusive upper bound of the address space.
    limit: u32,
    /// Number of linked nodes.
    len: usize,
}

impl FreeList {
    /// Create a list holding a single unbounded tail starting at `start`.
    pub fn new(start: Address, limit: u32) -> Self {
        Self {
            nodes: vec![FreeNode {
                span: FreeSpan {
                    address: start,
                    extent: Extent::Unbounded,
                },
                prev: None,
                next: None,
            }],
            vacant: Vec::new(),
            head: 0,
            tail: 0,
            limit,
            len: 1,
        }
    }

    /// Carve `len` bytes using first fit from the head of the list.
    ///
    /// Finite ranges are preferred in address order; the tail satisfies
    /// any request that fits below the address space bound. Returns
    /// `None` only when the tail cannot grow far enough.
    pub fn carve(&mut self, len: u32) -> Option<Address> {
        let mut cursor = Some(self.head);
        while let Some(i) = cursor {
            let node = self.nodes[i];
            match node.span.extent {
                Extent::Bounded(free) if free >= len => {
                    if free == len {
                        self.unlink(i);
                    } else {
                        let span = &mut self.nodes[i].span;
                        span.address = Address(node.span.address.0 + len);
                        span.extent = Extent::Bounded(free - len);
                    }
                    return Some(node.span.address);
                }
                Extent::Bounded(_) => cursor = node.next,
                Extent::Unbounded => {
                    let end = node.span.address.checked_add(len)?;
                    if end.0 > self.limit {
                        return None;
                    }
                    self.nodes[i].span.address = end;
                    return Some(node.span.address);
                }
            }
        }
        None
    }

    /// Return `[address, address + len)` to the list.
    ///
    /// The range is merged with its immediate predecessor and successor
    /// when they touch it. One hop in each direction is enough: the list
    /// held no touching pair before the call, so after absorbing the
    /// released range neither neighbour can touch anything else.
    ///
    /// The caller guarantees the range is currently allocated (not
    /// overlapping any free range).
    pub fn release(&mut self, address: Address, len: u32) {
        // Find the first node past `address`. The tail always qualifies
        // because it starts at or after the end of every allocated block.
        let mut prev = None;
        let mut next = Some(self.head);
        while let Some(i) = next {
            if self.nodes[i].span.address > address {
                break;
            }
            prev = Some(i);
            next = self.nodes[i].next;
        }

        let end = address.0 + len;
        let merge_prev = prev.filter(|&p| match self.nodes[p].span.extent {
            Extent::Bounded(plen) => self.nodes[p].span.address.0 + plen == address.0,
            Extent::Unbounded => false,
        });
        let merge_next = next.filter(|&n| self.nodes[n].span.address.0 == end);

        match (merge_prev, merge_next) {
            (Some(p), Some(n)) => {
                let plen = self.bounded_len(p);
                self.nodes[p].span.extent = match self.nodes[n].span.extent {
                    Extent::Bounded(nlen) => Extent::Bounded(plen + len + nlen),
                    Extent::Unbounded => Extent::Unbounded,
                };
                self.unlink(n);
            }
            (Some(p), None) => {
                let plen = self.bounded_len(p);
                self.nodes[p].span.extent = Extent::Bounded(plen + len);
            }
            (None, Some(n)) => {
                let span = &mut self.nodes[n].span;
                span.address = address;
                if let Extent::Bounded(nlen) = span.extent {
                    span.extent = Extent::Bounded(nlen + len);
                }
            }
            (None, None) => {
                self.link_between(
                    prev,
                    next,
                    FreeSpan {
                        address,
                        extent: Extent::Bounded(len),
                    },
                );
            }
        }
    }

    /// Iterate over the free ranges in address order.
    pub fn spans(&self) -> impl Iterator<Item = FreeSpan> + '_ {
        let mut cursor = Some(self.head);
        std::iter::from_fn(move || {
            let i = cursor?;
            cursor = self.nodes[i].next;
            Some(self.nodes[i].span)
        })
    }

    /// The unbounded tail range.
    pub fn tail(&self) -> FreeSpan {
        self.nodes[self.tail].span
    }

    /// Number of free ranges, including the tail.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: the tail is never removed.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn bounded_len(&self, i: usize) -> u32 {
        match self.nodes[i].span.extent {
            Extent::Bounded(len) => len,
            Extent::Unbounded => 0,
        }
    }

    fn link_between(&mut self, prev: Option<usize>, next: Option<usize>, span: FreeSpan) {
        let node = FreeNode { span, prev, next };
        let i = match self.vacant.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        match prev {
            Some(p) => self.nodes[p].next = Some(i),
            None => self.head = i,
        }
        match next {
            Some(n) => self.nodes[n].prev = Some(i),
            None => self.tail = i,
        }
        self.len += 1;
    }

    fn unlink(&mut self, i: usize) {
        let FreeNode { prev, next, .. } = self.nodes[i];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => {
                if let Some(n) = next {
                    self.head = n;
                }
            }
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => {
                if let Some(p) = prev {
                    self.tail = p;
                }
            }
        }
        self.vacant.push(i);
        self.len -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(list: &FreeList) -> Vec<(u32, i64)> {
        list.spans().map(|s| (s.address.0, s.length())).collect()
    }

    fn fresh() -> FreeList {
        FreeList::new(Address(4), u32::MAX)
    }

    #[test]
    fn new_list_is_single_tail() {
        let list = fresh();
        assert_eq!(spans(&list), vec![(4, -1)]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn carve_from_tail_is_sequential() {
        let mut list = fresh();
        assert_eq!(list.carve(16), Some(Address(4)));
        assert_eq!(list.carve(8), Some(Address(20)));
        assert_eq!(spans(&list), vec![(28, -1)]);
    }

    #[test]
    fn release_in_middle_creates_bounded_span() {
        let mut list = fresh();
        let a = list.carve(16).unwrap();
        let b = list.carve(16).unwrap();
        let _c = list.carve(16).unwrap();
        list.release(b, 16);
        assert_eq!(spans(&list), vec![(20, 16), (52, -1)]);
        list.release(a, 16);
        assert_eq!(spans(&list), vec![(4, 32), (52, -1)]);
    }

    #[test]
    fn release_touching_tail_merges_into_tail() {
        let mut list = fresh();
        let _a = list.carve(16).unwrap();
        let b = list.carve(16).unwrap();
        list.release(b, 16);
        assert_eq!(spans(&list), vec![(20, -1)]);
    }

    #[test]
    fn release_bridging_two_spans_merges_three_ways() {
        let mut list = fresh();
        let a = list.carve(8).unwrap();
        let b = list.carve(8).unwrap();
        let c = list.carve(8).unwrap();
        let _d = list.carve(8).unwrap();
        list.release(a, 8);
        list.release(c, 8);
        assert_eq!(list.len(), 3);
        list.release(b, 8);
        assert_eq!(spans(&list), vec![(4, 24), (36, -1)]);
    }

    #[test]
    fn bridging_into_tail_collapses_list() {
        let mut list = fresh();
        let a = list.carve(8).unwrap();
        let b = list.carve(8).unwrap();
        list.release(a, 8);
        list.release(b, 8);
        assert_eq!(spans(&list), vec![(4, -1)]);
        assert_eq!(list.tail().address, Address(4));
    }

    #[test]
    fn first_fit_prefers_earliest_span() {
        let mut list = fresh();
        let a = list.carve(32).unwrap();
        let _b = list.carve(8).unwrap();
        let c = list.carve(32).unwrap();
        let _d = list.carve(8).unwrap();
        list.release(a, 32);
        list.release(c, 32);
        // Both spans fit; the lower one wins and is split.
        assert_eq!(list.carve(16), Some(Address(4)));
        assert_eq!(spans(&list), vec![(20, 16), (44, 32), (84, -1)]);
        // Exact fit consumes the span entirely.
        assert_eq!(list.carve(16), Some(Address(20)));
        assert_eq!(spans(&list), vec![(44, 32), (84, -1)]);
    }

    #[test]
    fn too_large_request_skips_to_tail() {
        let mut list = fresh();
        let a = list.carve(8).unwrap();
        let _b = list.carve(8).unwrap();
        list.release(a, 8);
        assert_eq!(list.carve(12), Some(Address(20)));
        assert_eq!(spans(&list), vec![(4, 8), (32, -1)]);
    }

    #[test]
    fn tail_respects_limit() {
        let mut list = FreeList::new(Address(4), 20);
        assert_eq!(list.carve(16), Some(Address(4)));
        assert_eq!(list.carve(1), None);
        assert_eq!(spans(&list), vec![(20, -1)]);
    }

    #[test]
    fn vacant_slots_are_reused() {
        let mut list = fresh();
        let blocks: Vec<Address> = (0..6).map(|_| list.carve(8).unwrap()).collect();
        list.release(blocks[1], 8);
        list.release(blocks[3], 8);
        // Exact fits unlink both spans...
        list.carve(8).unwrap();
        list.carve(8).unwrap();
        let slab_len = list.nodes.len();
        // ...and new spans reuse their slots.
        list.release(blocks[1], 8);
        list.release(blocks[3], 8);
        assert_eq!(list.nodes.len(), slab_len);
        assert_eq!(spans(&list), vec![(12, 8), (28, 8), (52, -1)]);
    }
}
