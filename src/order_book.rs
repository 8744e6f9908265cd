//! Order book - per-instrument limit order book with price-time priority.
//!
//! Two ordered side maps (bids best = highest, asks best = lowest), two
//! id indices for O(1) lookup, and the matching algorithm. The book owns
//! its arena; every order that leaves the book - cancel, full fill, or a
//! discarded market-order remainder - is released back to it exactly once.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::arena::{Arena, ArenaIndex, NULL_INDEX};
use crate::events::{ClientId, InstrumentId, MarketData, OrderId, Price, Qty, Side};
use crate::price_level::PriceLevel;

/// Errors surfaced by book operations. Pool exhaustion is a sizing bug,
/// treated as fatal by the matching stage rather than recovered.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BookError {
    #[error("order pool exhausted (capacity {capacity})")]
    PoolExhausted { capacity: u32 },

    #[error("order quantity must be positive")]
    ZeroQuantity,
}

/// One instrument's book.
///
/// Constructed once (or recycled through the registry's free list) and
/// mutated only by the matching thread.
pub struct OrderBook {
    instrument: InstrumentId,

    /// Engine order ids, monotonic from 1; restored by [`reset`](Self::reset)
    next_order_id: u64,

    arena: Arena,

    /// Bid levels; best bid = highest key
    bids: BTreeMap<Price, PriceLevel>,
    /// Ask levels; best ask = lowest key
    asks: BTreeMap<Price, PriceLevel>,

    /// Engine order id -> arena slot
    orders: FxHashMap<OrderId, ArenaIndex>,
    /// Client order id -> (arena slot, side), the cancel-request index
    client_orders: FxHashMap<OrderId, (ArenaIndex, Side)>,
}

/// Does an incoming order at `limit` cross a resting level at `level_price`?
/// Market orders (limit 0) cross everything.
#[inline]
const fn crosses(taker_side: Side, limit: Price, level_price: Price) -> bool {
    if limit == 0 {
        return true;
    }
    match taker_side {
        Side::Buy => limit >= level_price,
        Side::Sell => limit <= level_price,
    }
}

impl OrderBook {
    pub fn new(instrument: InstrumentId, pool_size: u32) -> Self {
        Self {
            instrument,
            next_order_id: 1,
            arena: Arena::new(pool_size),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: FxHashMap::default(),
            client_orders: FxHashMap::default(),
        }
    }

    /// Retarget a recycled book at a new instrument.
    pub fn set_instrument(&mut self, instrument: InstrumentId) {
        self.instrument = instrument;
    }

    #[inline]
    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    /// Clear all state and restore the id counter. Used when the book is
    /// retired to the registry pool; afterwards the book is as-new.
    pub fn reset(&mut self) {
        self.next_order_id = 1;
        self.bids.clear();
        self.asks.clear();
        self.orders.clear();
        self.client_orders.clear();
        self.arena.clear();
    }

    /// Pre-fault the arena pages.
    pub fn warm_up(&mut self) {
        self.arena.warm_up();
    }

    // ========================================================================
    // Admission and matching
    // ========================================================================

    /// Admit a new order: assign an engine id, index it, emit ADD, match it,
    /// and rest any remainder (limit orders only).
    ///
    /// `price == 0` is a market order: it sweeps the opposite side without a
    /// price bound and is never rested; an unfilled remainder is discarded.
    pub fn add_order(
        &mut self,
        client_id: ClientId,
        client_order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        out: &mut Vec<MarketData>,
    ) -> Result<(), BookError> {
        if qty == 0 {
            return Err(BookError::ZeroQuantity);
        }

        let order_id = self.next_order_id;
        self.next_order_id += 1;

        let idx = self.arena.alloc().ok_or(BookError::PoolExhausted {
            capacity: self.arena.capacity(),
        })?;
        let node = self.arena.get_mut(idx);
        node.price = price;
        node.order_id = order_id;
        node.client_order_id = client_order_id;
        node.qty = qty;
        node.client_id = client_id;
        node.side = side;

        self.orders.insert(order_id, idx);
        self.client_orders.insert(client_order_id, (idx, side));

        // ADD is emitted unconditionally, even for orders that fill instantly
        out.push(MarketData::add(
            self.instrument,
            client_id,
            client_order_id,
            side,
            price,
            qty,
        ));

        self.match_incoming(idx, out);

        let remaining = self.arena.get(idx).qty;
        if remaining > 0 && price != 0 {
            // Rest the remainder at the tail of its level
            let at_or_better = self.improves_best(side, price);
            let level = match side {
                Side::Buy => self.bids.entry(price).or_insert_with(PriceLevel::new),
                Side::Sell => self.asks.entry(price).or_insert_with(PriceLevel::new),
            };
            level.append(&mut self.arena, idx);
            if at_or_better {
                self.publish_top(side, out);
            }
        } else {
            // The order leaves the book immediately: fully filled, or a
            // market-order remainder with no liquidity left to sweep.
            self.orders.remove(&order_id);
            self.client_orders.remove(&client_order_id);
            self.arena.free(idx);
        }

        Ok(())
    }

    /// Sweep the opposite side, best level first, strict FIFO within a level.
    ///
    /// One algorithm serves both orderings: the side only selects which map
    /// is walked and which way the crossing predicate points.
    fn match_incoming(&mut self, taker_idx: ArenaIndex, out: &mut Vec<MarketData>) {
        let taker_side = self.arena.get(taker_idx).side;
        let limit = self.arena.get(taker_idx).price;
        let passive_side = taker_side.opposite();
        let mut traded = false;

        loop {
            if self.arena.get(taker_idx).qty == 0 {
                break;
            }
            let Some(level_price) = self.best_price(passive_side) else {
                break;
            };
            if !crosses(taker_side, limit, level_price) {
                break;
            }
            traded = true;
            self.match_at_level(taker_idx, passive_side, level_price, out);
        }

        // The matched-against side's top may have changed or drained
        if traded {
            self.publish_top(passive_side, out);
        }
    }

    /// Match the taker against one crossed level until either is exhausted.
    /// Trades print at the passive price: price improvement accrues to the
    /// aggressor.
    fn match_at_level(
        &mut self,
        taker_idx: ArenaIndex,
        passive_side: Side,
        level_price: Price,
        out: &mut Vec<MarketData>,
    ) {
        loop {
            let taker = *self.arena.get(taker_idx);
            if taker.qty == 0 {
                break;
            }

            let map = match passive_side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            let Some(level) = map.get_mut(&level_price) else {
                break;
            };
            let passive_idx = level.front();
            if passive_idx == NULL_INDEX {
                break;
            }

            let passive = *self.arena.get(passive_idx);
            let match_qty = taker.qty.min(passive.qty);

            out.push(MarketData::trade(
                self.instrument,
                taker.client_id,
                taker.client_order_id,
                passive.client_id,
                passive.client_order_id,
                taker.side,
                level_price,
                match_qty,
            ));

            self.arena.get_mut(taker_idx).qty -= match_qty;

            if passive.qty == match_qty {
                // Passive fully filled: detach, un-index, release
                level.pop_front(&mut self.arena);
                self.orders.remove(&passive.order_id);
                self.client_orders.remove(&passive.client_order_id);
                self.arena.free(passive_idx);
            } else {
                self.arena.get_mut(passive_idx).qty -= match_qty;
                level.reduce(match_qty);
            }
        }

        // Drop the level eagerly once drained
        let map = match passive_side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if map.get(&level_price).is_some_and(|l| l.is_empty()) {
            map.remove(&level_price);
        }
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Cancel by client order id.
    ///
    /// Lookup is by client order id alone; the requesting client id is
    /// echoed into the event but not validated against the order's owner.
    /// An unknown id emits a distinguished "Not found" CANCEL and mutates
    /// nothing.
    pub fn cancel_order(
        &mut self,
        client_id: ClientId,
        client_order_id: OrderId,
        out: &mut Vec<MarketData>,
    ) -> bool {
        let Some(&(idx, side)) = self.client_orders.get(&client_order_id) else {
            out.push(MarketData::cancel_not_found(
                self.instrument,
                client_id,
                client_order_id,
            ));
            return false;
        };

        let node = *self.arena.get(idx);

        let map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if let Some(level) = map.get_mut(&node.price) {
            if level.unlink(&mut self.arena, idx) {
                map.remove(&node.price);
            }
        }

        self.client_orders.remove(&client_order_id);
        self.orders.remove(&node.order_id);

        out.push(MarketData::cancel(
            self.instrument,
            client_id,
            client_order_id,
            side,
            node.price,
            node.qty,
        ));
        self.publish_top(side, out);

        self.arena.free(idx);
        true
    }

    // ========================================================================
    // Top of book
    // ========================================================================

    /// Best price on a side, if any liquidity rests there.
    #[inline]
    pub fn best_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.bids.keys().next_back().copied(),
            Side::Sell => self.asks.keys().next().copied(),
        }
    }

    /// Would an order at `price` sit at or better than today's best?
    /// Vacuously true when the side is empty.
    #[inline]
    fn improves_best(&self, side: Side, price: Price) -> bool {
        match (side, self.best_price(side)) {
            (_, None) => true,
            (Side::Buy, Some(best)) => price >= best,
            (Side::Sell, Some(best)) => price <= best,
        }
    }

    /// Emit the current top of one side, or the empty-side placeholder.
    fn publish_top(&self, side: Side, out: &mut Vec<MarketData>) {
        let best = match side {
            Side::Buy => self.bids.iter().next_back(),
            Side::Sell => self.asks.iter().next(),
        };
        match best {
            Some((&price, level)) => out.push(MarketData::book_update(
                self.instrument,
                side,
                price,
                level.total_qty,
            )),
            None => out.push(MarketData::book_update_empty(self.instrument, side)),
        }
    }

    // ========================================================================
    // Inspection (tests, registry bookkeeping)
    // ========================================================================

    /// Total resting orders.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Is a client order id currently resting?
    pub fn contains_client_order(&self, client_order_id: OrderId) -> bool {
        self.client_orders.contains_key(&client_order_id)
    }

    /// (total qty, order count) resting at one (side, price).
    pub fn depth_at(&self, side: Side, price: Price) -> (u64, u32) {
        let level = match side {
            Side::Buy => self.bids.get(&price),
            Side::Sell => self.asks.get(&price),
        };
        level.map_or((0, 0), |l| (l.total_qty, l.count))
    }

    /// Number of price levels on a side.
    pub fn level_count(&self, side: Side) -> usize {
        match side {
            Side::Buy => self.bids.len(),
            Side::Sell => self.asks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Live arena allocations; equals `order_count` when no order leaked.
    pub fn pool_in_use(&self) -> u32 {
        self.arena.allocated()
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("instrument", &self.instrument)
            .field("best_bid", &self.best_price(Side::Buy))
            .field("best_ask", &self.best_price(Side::Sell))
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("order_count", &self.orders.len())
            .finish()
    }
}
