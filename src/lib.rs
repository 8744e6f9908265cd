//! # Matchbook
//!
//! A multi-instrument limit order book matching venue with a lock-free
//! ingest pipeline.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: the match stage alone owns every book (no locks)
//! - **Price-Time Priority**: strict FIFO inside each price level
//! - **Arena Allocation**: 64-byte aligned nodes, 32-bit indices, no heap
//!   allocation in the hot path
//! - **Pooled Books**: retired books are reset and reused, never freed
//!
//! ## Architecture
//!
//! ```text
//! [UDP Ingest] -> [Parse] -> [Match (single writer)] -> [Publish]
//!      raw ring      request ring       event ring
//! ```

pub mod arena;
pub mod config;
pub mod events;
pub mod order_book;
pub mod parser;
pub mod pipeline;
pub mod price_level;
pub mod publisher;
pub mod registry;

// Re-exports for convenience
pub use arena::{Arena, ArenaIndex, OrderNode, NULL_INDEX};
pub use config::AppConfig;
pub use events::{EventKind, MarketData, ParsedRequest, Request, Side, Symbol};
pub use order_book::{BookError, OrderBook};
pub use price_level::PriceLevel;
pub use registry::BookRegistry;
