//! Market data publisher - renders the event stream for downstream
//! consumers.
//!
//! Line formats mirror the wire the original feed spoke (one line per
//! event, comma-separated). Events arrive in mutation order and are
//! rendered in that order; the publisher never reorders or drops.

use log::info;

use crate::events::{EventKind, MarketData};

/// Render one event to its output line.
pub fn render(data: &MarketData) -> String {
    match data.kind {
        EventKind::Add => {
            if data.note.is_empty() {
                format!("A, {}, {}", data.client_id, data.order_id)
            } else {
                format!("A, {}, {} ({})", data.client_id, data.order_id, data.note)
            }
        }
        EventKind::Cancel => {
            if data.note.is_empty() {
                format!("C, {}, {}", data.client_id, data.order_id)
            } else {
                format!("C, {}, {} ({})", data.client_id, data.order_id, data.note)
            }
        }
        EventKind::Trade => format!(
            "T, {}, {}, {}, {}, {}, {}",
            data.client_id,
            data.order_id,
            data.passive_client_id,
            data.passive_order_id,
            data.price,
            data.qty
        ),
        EventKind::BookUpdate => {
            // Empty sides carry their placeholder line in the note
            if data.note.is_empty() {
                let side = data.side.map_or('-', |s| s.code());
                format!("B, {}, {}, {}", side, data.price, data.qty)
            } else {
                data.note.to_string()
            }
        }
        EventKind::Flush => data.note.to_string(),
    }
}

/// Render and emit one event.
#[inline]
pub fn publish(data: &MarketData) {
    info!("{}", render(data));
}
