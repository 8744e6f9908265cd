//! Request and event types for the matching core.
//!
//! Requests are inputs from the parsing thread; MarketData events are
//! outputs to the publishing thread. Everything here is `Copy` and
//! fixed-size: values crossing a queue are moved, never aliased, so no
//! stage ever shares mutable state with another.

use std::fmt::Write as _;

use arrayvec::ArrayString;

/// Engine-internal numeric identifier for a traded symbol
pub type InstrumentId = u32;
/// Client identifier as carried on the wire
pub type ClientId = u32;
/// Order identifier (client-assigned or engine-assigned)
pub type OrderId = u64;
/// Limit price in ticks; 0 denotes a market order
pub type Price = u64;
/// Order quantity
pub type Qty = u32;

/// Ticker symbol, bounded so requests stay heap-free
pub type Symbol = ArrayString<16>;

/// Free-text annotation attached to an event ("Not found", flush sequence, ...)
pub type Note = ArrayString<40>;

/// Order side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Wire/rendering code: `B` or `S`
    #[inline]
    pub const fn code(self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }
}

// ============================================================================
// Ingress
// ============================================================================

/// One structured request, consumed exactly once by the matching stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    New {
        client_id: ClientId,
        client_order_id: OrderId,
        symbol: Symbol,
        side: Side,
        price: Price,
        qty: Qty,
    },
    Cancel {
        client_id: ClientId,
        client_order_id: OrderId,
    },
    Flush,
}

/// A parsed request plus the timestamps the pipeline carries alongside it
#[derive(Clone, Copy, Debug)]
pub struct ParsedRequest {
    /// Client-stamped send time (nanos), first wire field
    pub send_nanos: u64,
    /// Ingest-stamped receive time (nanos)
    pub recv_nanos: u64,
    pub request: Request,
}

// ============================================================================
// Egress
// ============================================================================

/// Kind discriminant for [`MarketData`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    Add = 0,
    Cancel = 1,
    Trade = 2,
    BookUpdate = 3,
    Flush = 4,
}

/// One book-change event.
///
/// Append-only and ordered: the sequence observed downstream equals the
/// sequence of mutations applied to the book that produced it. Field
/// applicability follows the original wire shape: a single flat record
/// with unused fields zeroed.
#[derive(Clone, Copy, Debug)]
pub struct MarketData {
    pub kind: EventKind,
    pub instrument: InstrumentId,
    /// Aggressive (or subject) client id
    pub client_id: ClientId,
    /// Aggressive (or subject) order id, client-assigned
    pub order_id: OrderId,
    /// Passive client id (trades only)
    pub passive_client_id: ClientId,
    /// Passive order id (trades only)
    pub passive_order_id: OrderId,
    /// Side the event refers to; `None` when unknown (e.g. not-found cancel)
    pub side: Option<Side>,
    pub price: Price,
    pub qty: u64,
    pub note: Note,
}

impl MarketData {
    fn blank(kind: EventKind, instrument: InstrumentId) -> Self {
        Self {
            kind,
            instrument,
            client_id: 0,
            order_id: 0,
            passive_client_id: 0,
            passive_order_id: 0,
            side: None,
            price: 0,
            qty: 0,
            note: Note::new(),
        }
    }

    pub fn add(
        instrument: InstrumentId,
        client_id: ClientId,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
    ) -> Self {
        Self {
            client_id,
            order_id,
            side: Some(side),
            price,
            qty: qty as u64,
            ..Self::blank(EventKind::Add, instrument)
        }
    }

    pub fn cancel(
        instrument: InstrumentId,
        client_id: ClientId,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
    ) -> Self {
        Self {
            client_id,
            order_id,
            side: Some(side),
            price,
            qty: qty as u64,
            ..Self::blank(EventKind::Cancel, instrument)
        }
    }

    /// Cancel for an unknown client order id; side/price/qty unknown
    pub fn cancel_not_found(
        instrument: InstrumentId,
        client_id: ClientId,
        order_id: OrderId,
    ) -> Self {
        let mut data = Self::blank(EventKind::Cancel, instrument);
        data.client_id = client_id;
        data.order_id = order_id;
        data.note.push_str("Not found");
        data
    }

    pub fn trade(
        instrument: InstrumentId,
        aggressive_client: ClientId,
        aggressive_order: OrderId,
        passive_client: ClientId,
        passive_order: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
    ) -> Self {
        Self {
            client_id: aggressive_client,
            order_id: aggressive_order,
            passive_client_id: passive_client,
            passive_order_id: passive_order,
            side: Some(side),
            price,
            qty: qty as u64,
            ..Self::blank(EventKind::Trade, instrument)
        }
    }

    /// Top-of-book snapshot for one side
    pub fn book_update(instrument: InstrumentId, side: Side, price: Price, qty: u64) -> Self {
        Self {
            side: Some(side),
            price,
            qty,
            ..Self::blank(EventKind::BookUpdate, instrument)
        }
    }

    /// Top-of-book for a side with no resting liquidity; rendered as a
    /// literal placeholder line
    pub fn book_update_empty(instrument: InstrumentId, side: Side) -> Self {
        let mut data = Self::blank(EventKind::BookUpdate, instrument);
        data.side = Some(side);
        let _ = write!(data.note, "B, {}, -, -", side.code());
        data
    }

    /// Full-market flush, annotated with a monotonically increasing sequence
    pub fn flush(sequence: u64) -> Self {
        let mut data = Self::blank(EventKind::Flush, 0);
        let _ = write!(data.note, "book flush #{}", sequence);
        data
    }
}
