//! Arena allocator - O(1) slab allocator with cache-line aligned order nodes.
//!
//! The arena pre-allocates a contiguous block of memory at startup,
//! eliminating heap allocation in the hot path. Uses a free list for
//! O(1) allocation and deallocation. Each book owns one arena; only the
//! matching thread ever touches it, so no locking is needed.

use std::fmt;

use crate::events::Side;

/// Sentinel value representing a null/invalid index (like nullptr)
pub const NULL_INDEX: u32 = u32::MAX;

/// Type alias for arena indices - our "compressed pointers"
/// Using u32 instead of 64-bit pointers halves linkage metadata,
/// doubling cache efficiency.
pub type ArenaIndex = u32;

/// A single order in the book - exactly 64 bytes (one cache line).
///
/// # Memory Layout
///
/// | Field           | Type    | Offset | Size |
/// |-----------------|---------|--------|------|
/// | price           | u64     | 0      | 8    |
/// | order_id        | u64     | 8      | 8    |
/// | client_order_id | u64     | 16     | 8    |
/// | qty             | u32     | 24     | 4    |
/// | client_id       | u32     | 28     | 4    |
/// | next            | u32     | 32     | 4    |
/// | prev            | u32     | 36     | 4    |
/// | side            | u8      | 40     | 1    |
/// | _reserved       | [u8;23] | 41     | 23   |
/// | **Total**       |         |        | 64   |
#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy)]
pub struct OrderNode {
    // === Hot data (touched on every match) ===
    /// Limit price in ticks; 0 marks a market order
    pub price: u64,

    /// Engine-assigned order id, monotonic per book. Never changes.
    pub order_id: u64,

    /// Client-assigned order id, unique per client. Never changes.
    pub client_order_id: u64,

    /// Remaining quantity to fill
    pub qty: u32,

    /// Owning client id
    pub client_id: u32,

    // === Linkage (FIFO queue within a PriceLevel) ===
    /// Index of next order at the same price level
    pub next: ArenaIndex,

    /// Index of previous order (enables O(1) cancel)
    pub prev: ArenaIndex,

    /// Side the order rests on. Never changes.
    pub side: Side,

    pub _reserved: [u8; 23],
}

// Compile-time assertion: OrderNode must be exactly 64 bytes
const _: () = assert!(
    std::mem::size_of::<OrderNode>() == 64,
    "OrderNode must be exactly 64 bytes (one cache line)"
);

// Compile-time assertion: OrderNode must be 64-byte aligned
const _: () = assert!(
    std::mem::align_of::<OrderNode>() == 64,
    "OrderNode must be 64-byte aligned"
);

impl OrderNode {
    /// Create an empty/uninitialized node (for the free list)
    #[inline]
    pub const fn empty() -> Self {
        Self {
            price: 0,
            order_id: 0,
            client_order_id: 0,
            qty: 0,
            client_id: 0,
            next: NULL_INDEX,
            prev: NULL_INDEX,
            side: Side::Buy,
            _reserved: [0u8; 23],
        }
    }

    /// Reset the node for reuse (when returning to the free list)
    #[inline]
    pub fn reset(&mut self) {
        self.price = 0;
        self.order_id = 0;
        self.client_order_id = 0;
        self.qty = 0;
        self.client_id = 0;
        self.next = NULL_INDEX;
        self.prev = NULL_INDEX;
        self.side = Side::Buy;
    }
}

impl fmt::Debug for OrderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderNode")
            .field("order_id", &self.order_id)
            .field("client_order_id", &self.client_order_id)
            .field("client_id", &self.client_id)
            .field("side", &self.side)
            .field("price", &self.price)
            .field("qty", &self.qty)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Pre-allocated memory pool with O(1) allocation and deallocation.
///
/// Uses a free list threaded through the `next` field of unused nodes.
/// No system calls or locks in the hot path.
pub struct Arena {
    /// Contiguous block of pre-allocated nodes
    nodes: Vec<OrderNode>,

    /// Head of the free list (index of first available node)
    free_head: ArenaIndex,

    /// Number of currently allocated nodes
    allocated_count: u32,

    /// Total capacity
    capacity: u32,
}

impl Arena {
    /// Create a new arena with the specified capacity.
    ///
    /// # Panics
    /// Panics if capacity exceeds u32::MAX - 1 (MAX is reserved for NULL_INDEX)
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_INDEX, "Capacity must be less than NULL_INDEX");

        let mut nodes = vec![OrderNode::empty(); capacity as usize];
        Self::thread_free_list(&mut nodes);

        Self {
            nodes,
            free_head: if capacity > 0 { 0 } else { NULL_INDEX },
            allocated_count: 0,
            capacity,
        }
    }

    /// Thread the free list through all nodes: each node's `next`
    /// points at the following slot, the last at NULL.
    fn thread_free_list(nodes: &mut [OrderNode]) {
        let capacity = nodes.len();
        for (i, node) in nodes.iter_mut().enumerate() {
            node.reset();
            node.next = if i + 1 < capacity {
                (i + 1) as ArenaIndex
            } else {
                NULL_INDEX
            };
        }
    }

    /// Allocate a node from the arena.
    ///
    /// Returns `None` if the arena is full.
    ///
    /// # Complexity
    /// O(1) - pops from head of free list
    #[inline]
    pub fn alloc(&mut self) -> Option<ArenaIndex> {
        if self.free_head == NULL_INDEX {
            return None;
        }

        let index = self.free_head;
        self.free_head = self.nodes[index as usize].next;
        self.allocated_count += 1;

        self.nodes[index as usize].next = NULL_INDEX;
        self.nodes[index as usize].prev = NULL_INDEX;

        Some(index)
    }

    /// Free a node back to the arena.
    ///
    /// The caller must ensure the index was previously allocated and
    /// has not already been freed (no double-free protection).
    ///
    /// # Complexity
    /// O(1) - pushes to head of free list
    #[inline]
    pub fn free(&mut self, index: ArenaIndex) {
        debug_assert!(index < self.capacity, "Index out of bounds");
        debug_assert!(self.allocated_count > 0, "Double free detected");

        self.nodes[index as usize].reset();
        self.nodes[index as usize].next = self.free_head;
        self.free_head = index;
        self.allocated_count -= 1;
    }

    /// Get an immutable reference to a node.
    #[inline]
    pub fn get(&self, index: ArenaIndex) -> &OrderNode {
        debug_assert!(index < self.capacity, "Index out of bounds");
        &self.nodes[index as usize]
    }

    /// Get a mutable reference to a node.
    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> &mut OrderNode {
        debug_assert!(index < self.capacity, "Index out of bounds");
        &mut self.nodes[index as usize]
    }

    /// Returns the number of currently allocated nodes.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated_count
    }

    /// Returns the total capacity of the arena.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns true if the arena is empty (no allocated nodes).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Returns true if the arena is full (no free nodes).
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == NULL_INDEX
    }

    /// Drop every allocation and re-thread the free list.
    ///
    /// O(capacity); used when a book is recycled on flush, never on
    /// the per-request hot path.
    pub fn clear(&mut self) {
        Self::thread_free_list(&mut self.nodes);
        self.free_head = if self.capacity > 0 { 0 } else { NULL_INDEX };
        self.allocated_count = 0;
    }

    /// Pre-fault all memory pages (warm-up routine).
    ///
    /// Walks through all nodes to force the OS to map virtual pages
    /// to physical RAM, preventing page faults in the hot path.
    pub fn warm_up(&mut self) {
        for node in &mut self.nodes {
            // Volatile write to prevent optimization
            unsafe {
                std::ptr::write_volatile(&mut node._reserved[0], 0);
            }
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated_count)
            .field("free_head", &self.free_head)
            .finish()
    }
}
