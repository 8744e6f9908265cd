//! Wire-format parser - one ASCII datagram line into one [`Request`].
//!
//! Format (comma-separated, `#`-prefixed lines are comments):
//!
//! ```text
//! <sendTimeNanos>,N,<clientId>,<symbol>,<price>,<qty>,<side:B|S>,<clientOrderId>
//! <sendTimeNanos>,C,<clientId>,<clientOrderId>
//! <sendTimeNanos>,F
//! ```
//!
//! Malformed input never reaches the matching stage: bad field counts,
//! unknown type codes and unparsable numbers are warn-logged and dropped.
//! `price == 0` on a New request means "market order".

use arrayvec::ArrayVec;
use log::warn;

use crate::events::{ParsedRequest, Request, Side, Symbol};

/// Fields read per line; anything beyond is ignored
const MAX_PARTS: usize = 10;

/// Parse one raw line stamped with its receive time.
///
/// Returns `None` for comments, blanks and anything malformed.
pub fn parse_line(raw: &[u8], recv_nanos: u64) -> Option<ParsedRequest> {
    let Ok(text) = std::str::from_utf8(raw) else {
        warn!("dropping non-UTF8 datagram ({} bytes)", raw.len());
        return None;
    };
    let line = text.trim_end_matches(['\r', '\n']);
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts: ArrayVec<&str, MAX_PARTS> = ArrayVec::new();
    for part in line.split(',') {
        if parts.try_push(part).is_err() {
            break;
        }
    }
    if parts.len() < 2 {
        warn!("dropping short message: {:?}", line);
        return None;
    }

    // A garbled send time only skews latency accounting; tolerate it
    let send_nanos = parts[0].trim().parse::<u64>().unwrap_or(0);

    let request = match parts[1].trim() {
        "N" => parse_new(&parts, line)?,
        "C" => parse_cancel(&parts, line)?,
        "F" => Request::Flush,
        other => {
            warn!("unknown message type {:?}: {:?}", other, line);
            return None;
        }
    };

    Some(ParsedRequest {
        send_nanos,
        recv_nanos,
        request,
    })
}

fn parse_new(parts: &[&str], line: &str) -> Option<Request> {
    if parts.len() != 8 {
        warn!("invalid 'N' message format: {:?}", line);
        return None;
    }

    let client_id = parse_num(parts[2], line)?;
    let Ok(symbol) = Symbol::from(parts[3].trim()) else {
        warn!("symbol too long: {:?}", line);
        return None;
    };
    let price = parse_num(parts[4], line)?;
    let qty = parse_num(parts[5], line)?;
    let side = match parts[6].trim() {
        "B" => Side::Buy,
        "S" => Side::Sell,
        _ => {
            warn!("invalid side: {:?}", line);
            return None;
        }
    };
    let client_order_id = parse_num(parts[7], line)?;

    Some(Request::New {
        client_id,
        client_order_id,
        symbol,
        side,
        price,
        qty,
    })
}

fn parse_cancel(parts: &[&str], line: &str) -> Option<Request> {
    if parts.len() != 4 {
        warn!("invalid 'C' message format: {:?}", line);
        return None;
    }

    Some(Request::Cancel {
        client_id: parse_num(parts[2], line)?,
        client_order_id: parse_num(parts[3], line)?,
    })
}

#[inline]
fn parse_num<T: std::str::FromStr>(field: &str, line: &str) -> Option<T> {
    match field.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("unparsable numeric field {:?}: {:?}", field, line);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Option<ParsedRequest> {
        parse_line(s.as_bytes(), 42)
    }

    #[test]
    fn test_parse_new_order() {
        let msg = parse("1700000000000,N,1,IBM,10050,25,B,101").unwrap();
        assert_eq!(msg.send_nanos, 1_700_000_000_000);
        assert_eq!(msg.recv_nanos, 42);
        assert_eq!(
            msg.request,
            Request::New {
                client_id: 1,
                client_order_id: 101,
                symbol: Symbol::from("IBM").unwrap(),
                side: Side::Buy,
                price: 10050,
                qty: 25,
            }
        );
    }

    #[test]
    fn test_parse_market_order_price_zero() {
        let msg = parse("1,N,1,VOD,0,25,S,7").unwrap();
        match msg.request {
            Request::New { price, side, .. } => {
                assert_eq!(price, 0);
                assert_eq!(side, Side::Sell);
            }
            other => panic!("expected New, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_cancel() {
        let msg = parse("1,C,3,777").unwrap();
        assert_eq!(
            msg.request,
            Request::Cancel {
                client_id: 3,
                client_order_id: 777,
            }
        );
    }

    #[test]
    fn test_parse_flush_ignores_extra_fields() {
        assert_eq!(parse("1,F").unwrap().request, Request::Flush);
        assert_eq!(parse("1,F,anything,else").unwrap().request, Request::Flush);
    }

    #[test]
    fn test_comments_and_blanks_dropped_silently() {
        assert!(parse("# scenario 3: market sweep").is_none());
        assert!(parse("").is_none());
        assert!(parse("\r\n").is_none());
    }

    #[test]
    fn test_bad_field_counts_dropped() {
        assert!(parse("1,N,1,IBM,10050,25,B").is_none()); // 7 fields
        assert!(parse("1,N,1,IBM,10050,25,B,101,extra").is_none()); // 9 fields
        assert!(parse("1,C,3").is_none()); // 3 fields
        assert!(parse("1,C,3,777,extra").is_none()); // 5 fields
    }

    #[test]
    fn test_unknown_type_dropped() {
        assert!(parse("1,X,1,2").is_none());
        assert!(parse("1").is_none());
    }

    #[test]
    fn test_garbage_numerics_dropped() {
        assert!(parse("1,N,abc,IBM,10050,25,B,101").is_none());
        assert!(parse("1,N,1,IBM,ten,25,B,101").is_none());
        assert!(parse("1,C,1,not-a-number").is_none());
    }

    #[test]
    fn test_bad_side_dropped() {
        assert!(parse("1,N,1,IBM,10050,25,X,101").is_none());
    }

    #[test]
    fn test_trailing_newline_tolerated() {
        assert!(parse("1,C,3,777\n").is_some());
    }

    #[test]
    fn test_overlong_symbol_dropped() {
        assert!(parse("1,N,1,AVERYLONGSYMBOLNAME,100,25,B,101").is_none());
    }

    #[test]
    fn test_garbled_send_time_tolerated() {
        let msg = parse("???,C,3,777").unwrap();
        assert_eq!(msg.send_nanos, 0);
    }
}
