//! Price level - the FIFO queue of all orders resting at one price.
//!
//! A doubly-linked list threaded through arena indices: O(1) append at
//! the tail, O(1) pop at the head during matching, O(1) unlink from any
//! position on cancel. The level owns the chain; the book's id indices
//! hold lookup keys only, never deallocation authority.

use crate::arena::{Arena, ArenaIndex, NULL_INDEX};

/// Aggregate of the orders resting at one (side, price).
///
/// Invariants (checked by the test suite, relied on everywhere):
/// `total_qty` equals the sum of remaining quantities in the chain and
/// `count` equals the chain length. A level with `count == 0` must not
/// remain in a book's side map.
#[derive(Clone, Copy, Debug, Default)]
pub struct PriceLevel {
    /// Oldest order: first to match
    pub head: ArenaIndex,
    /// Newest order: last to match
    pub tail: ArenaIndex,
    /// Sum of remaining quantities at this level
    pub total_qty: u64,
    /// Number of resting orders at this level
    pub count: u32,
}

impl PriceLevel {
    #[inline]
    pub const fn new() -> Self {
        Self {
            head: NULL_INDEX,
            tail: NULL_INDEX,
            total_qty: 0,
            count: 0,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append an order at the tail (lowest time priority).
    #[inline]
    pub fn append(&mut self, arena: &mut Arena, index: ArenaIndex) {
        let qty = arena.get(index).qty;

        if self.tail == NULL_INDEX {
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
            self.tail = index;
            arena.get_mut(index).prev = NULL_INDEX;
            arena.get_mut(index).next = NULL_INDEX;
        } else {
            arena.get_mut(self.tail).next = index;
            arena.get_mut(index).prev = self.tail;
            arena.get_mut(index).next = NULL_INDEX;
            self.tail = index;
        }

        self.count += 1;
        self.total_qty += qty as u64;
    }

    /// Detach the head order (highest time priority).
    ///
    /// The node is NOT freed; the caller decides its fate.
    #[inline]
    pub fn pop_front(&mut self, arena: &mut Arena) -> Option<ArenaIndex> {
        if self.head == NULL_INDEX {
            return None;
        }

        let index = self.head;
        let node = arena.get(index);
        let next_idx = node.next;
        let qty = node.qty;

        if next_idx == NULL_INDEX {
            // Was the only node
            self.head = NULL_INDEX;
            self.tail = NULL_INDEX;
        } else {
            self.head = next_idx;
            arena.get_mut(next_idx).prev = NULL_INDEX;
        }

        self.count -= 1;
        self.total_qty -= qty as u64;

        let node = arena.get_mut(index);
        node.prev = NULL_INDEX;
        node.next = NULL_INDEX;

        Some(index)
    }

    /// Detach an order from anywhere in the chain (cancel path).
    ///
    /// Handles the only-node, head, tail and middle cases. The node is
    /// NOT freed; the caller decides its fate.
    ///
    /// Returns `true` if the level is now empty and must be removed
    /// from its side map.
    #[inline]
    pub fn unlink(&mut self, arena: &mut Arena, index: ArenaIndex) -> bool {
        let node = arena.get(index);
        let prev_idx = node.prev;
        let next_idx = node.next;
        let qty = node.qty;

        if prev_idx == NULL_INDEX && next_idx == NULL_INDEX {
            debug_assert!(self.head == index && self.tail == index);
            self.head = NULL_INDEX;
            self.tail = NULL_INDEX;
        } else if prev_idx == NULL_INDEX {
            debug_assert!(self.head == index);
            self.head = next_idx;
            arena.get_mut(next_idx).prev = NULL_INDEX;
        } else if next_idx == NULL_INDEX {
            debug_assert!(self.tail == index);
            self.tail = prev_idx;
            arena.get_mut(prev_idx).next = NULL_INDEX;
        } else {
            arena.get_mut(prev_idx).next = next_idx;
            arena.get_mut(next_idx).prev = prev_idx;
        }

        self.count -= 1;
        self.total_qty -= qty as u64;

        let node = arena.get_mut(index);
        node.prev = NULL_INDEX;
        node.next = NULL_INDEX;

        self.count == 0
    }

    /// Head order without detaching it.
    #[inline]
    pub const fn front(&self) -> ArenaIndex {
        self.head
    }

    /// Account for a partial fill after decrementing a node's qty directly.
    #[inline]
    pub fn reduce(&mut self, qty: u32) {
        debug_assert!(self.total_qty >= qty as u64);
        self.total_qty -= qty as u64;
    }
}
