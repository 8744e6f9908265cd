//! Book registry - routes requests to per-symbol books and recycles
//! retired books through a free list.
//!
//! Owned exclusively by the matching thread. This is the explicit-context
//! replacement for what used to be a pile of free-standing globals in the
//! original engine: every index and pool lives here and is passed into the
//! match stage by value.

use log::info;
use rustc_hash::FxHashMap;

use crate::events::{InstrumentId, MarketData, OrderId, Request, Symbol};
use crate::order_book::{BookError, OrderBook};

/// Symbol-to-book registry plus the book free list.
pub struct BookRegistry {
    /// Arena capacity for each book constructed or recycled here
    order_pool_size: u32,

    /// Symbol -> engine instrument id, assigned on first sight
    tickers: FxHashMap<Symbol, InstrumentId>,
    /// Symbol -> live book
    books: FxHashMap<Symbol, OrderBook>,
    /// Client order id -> owning symbol, so cancels route without a scan
    order_owner: FxHashMap<OrderId, Symbol>,

    /// Retired books, reused instead of reallocating on new instruments
    free_books: Vec<OrderBook>,

    next_instrument_id: InstrumentId,
    flush_count: u64,
}

impl BookRegistry {
    /// `order_pool_size` sizes each book's arena; `book_pool_size` books
    /// are pre-constructed so the first instruments never allocate.
    pub fn new(order_pool_size: u32, book_pool_size: usize) -> Self {
        let free_books = (0..book_pool_size)
            .map(|_| OrderBook::new(0, order_pool_size))
            .collect();

        Self {
            order_pool_size,
            tickers: FxHashMap::default(),
            books: FxHashMap::default(),
            order_owner: FxHashMap::default(),
            free_books,
            next_instrument_id: 1,
            flush_count: 0,
        }
    }

    /// Pre-fault every pooled book's arena pages.
    pub fn warm_up(&mut self) {
        for book in &mut self.free_books {
            book.warm_up();
        }
    }

    /// Apply one request, appending the resulting events to `out`.
    ///
    /// Errors are sizing/validation failures from admission; routing
    /// misses (cancel for an unknown id) are normal outcomes, not errors.
    pub fn process(&mut self, request: &Request, out: &mut Vec<MarketData>) -> Result<(), BookError> {
        match *request {
            Request::New {
                client_id,
                client_order_id,
                symbol,
                side,
                price,
                qty,
            } => {
                let instrument = match self.tickers.get(&symbol) {
                    Some(&id) => id,
                    None => {
                        let id = self.next_instrument_id;
                        self.next_instrument_id += 1;
                        self.tickers.insert(symbol, id);
                        id
                    }
                };

                if !self.books.contains_key(&symbol) {
                    let book = match self.free_books.pop() {
                        Some(mut recycled) => {
                            recycled.reset();
                            recycled.set_instrument(instrument);
                            recycled
                        }
                        None => OrderBook::new(instrument, self.order_pool_size),
                    };
                    self.books.insert(symbol, book);
                }

                let book = self
                    .books
                    .get_mut(&symbol)
                    .expect("book inserted above");
                book.add_order(client_id, client_order_id, side, price, qty, out)?;
                self.order_owner.insert(client_order_id, symbol);
                Ok(())
            }

            Request::Cancel {
                client_id,
                client_order_id,
            } => {
                match self.order_owner.get(&client_order_id) {
                    Some(symbol) => {
                        let book = self
                            .books
                            .get_mut(symbol)
                            .expect("owner index points at a live book");
                        if book.cancel_order(client_id, client_order_id, out) {
                            self.order_owner.remove(&client_order_id);
                        }
                    }
                    None => {
                        // No book ever saw this id; informational, no state touched
                        info!(
                            "C, {}, {} (Not found in any book)",
                            client_id, client_order_id
                        );
                    }
                }
                Ok(())
            }

            Request::Flush => {
                for (_, mut book) in self.books.drain() {
                    book.reset();
                    self.free_books.push(book);
                }
                self.tickers.clear();
                self.order_owner.clear();
                self.next_instrument_id = 1;

                self.flush_count += 1;
                out.push(MarketData::flush(self.flush_count));
                Ok(())
            }
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn active_books(&self) -> usize {
        self.books.len()
    }

    pub fn pooled_books(&self) -> usize {
        self.free_books.len()
    }

    pub fn instrument_of(&self, symbol: &Symbol) -> Option<InstrumentId> {
        self.tickers.get(symbol).copied()
    }

    pub fn book(&self, symbol: &Symbol) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    /// Client order ids currently tracked for cancel routing.
    pub fn tracked_orders(&self) -> usize {
        self.order_owner.len()
    }
}
