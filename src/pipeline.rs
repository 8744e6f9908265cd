//! Ingestion pipeline - four single-purpose stages over bounded SPSC rings.
//!
//! ```text
//! [UDP ingest] -RawPacket-> [parse] -ParsedRequest-> [match] -MarketData-> [publish]
//! ```
//!
//! Each stage runs on its own long-lived thread, optionally pinned to a
//! fixed core. Only value types cross a ring; the match stage is the sole
//! owner and sole mutator of all book/registry state, which is what lets
//! the whole path run without a single lock. Consumption is polling with
//! an explicit backoff policy instead of an unconditional busy loop.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{error, warn};
use rtrb::{Consumer, Producer, PushError};

use crate::events::{MarketData, ParsedRequest};
use crate::order_book::BookError;
use crate::parser::parse_line;
use crate::publisher;
use crate::registry::BookRegistry;

/// Largest datagram the ingest stage accepts; longer payloads truncate
pub const MAX_DATAGRAM: usize = 256;

/// One received datagram plus its receive timestamp. Fixed-size so the
/// ring carries it by value.
#[derive(Clone, Copy)]
pub struct RawPacket {
    bytes: [u8; MAX_DATAGRAM],
    len: u16,
    pub recv_nanos: u64,
}

impl RawPacket {
    pub fn new(payload: &[u8], recv_nanos: u64) -> Self {
        let len = payload.len().min(MAX_DATAGRAM);
        let mut bytes = [0u8; MAX_DATAGRAM];
        bytes[..len].copy_from_slice(&payload[..len]);
        Self {
            bytes,
            len: len as u16,
            recv_nanos,
        }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Cooperative shutdown flag shared by every stage.
pub struct ShutdownFlag(AtomicBool);

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self(AtomicBool::new(false))
    }
}

impl ShutdownFlag {
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What an idle stage does while its input ring is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Pure busy-spin: lowest jitter, one core burned per stage
    Spin { loops: u32 },
    /// Spin first, then yield, then short-sleep: bounded CPU when idle
    SpinThenSleep { loops: u32, sleep_micros: u64 },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::SpinThenSleep {
            loops: 64,
            sleep_micros: 50,
        }
    }
}

/// Per-loop idle state: escalates according to the policy, resets on
/// any progress.
pub struct IdleWait {
    policy: BackoffPolicy,
    idle_iters: u32,
}

impl IdleWait {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            idle_iters: 0,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.idle_iters = 0;
    }

    #[inline]
    pub fn idle(&mut self) {
        match self.policy {
            BackoffPolicy::Spin { loops } => spin(loops),
            BackoffPolicy::SpinThenSleep { loops, sleep_micros } => {
                if self.idle_iters < 64 {
                    spin(loops);
                    self.idle_iters += 1;
                } else if self.idle_iters < 256 {
                    std::thread::yield_now();
                    self.idle_iters += 1;
                } else {
                    std::thread::sleep(Duration::from_micros(sleep_micros));
                }
            }
        }
    }
}

#[inline]
fn spin(mut loops: u32) {
    while loops > 0 {
        std::hint::spin_loop();
        loops -= 1;
    }
}

/// Wall-clock nanos since the epoch; comparable to the client send stamp.
#[inline]
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Pin the current thread to a fixed core, if one was configured.
pub fn pin_to_core(core_index: Option<usize>) {
    if let Some(idx) = core_index {
        if let Some(cores) = core_affinity::get_core_ids() {
            if let Some(core_id) = cores.into_iter().find(|c| c.id == idx) {
                let _ = core_affinity::set_for_current(core_id);
            }
        }
    }
}

/// Push into a ring, backing off while it is full. Interior stages never
/// drop once a request has been admitted; only shutdown abandons the push.
fn push_or_wait<T>(
    producer: &mut Producer<T>,
    mut value: T,
    shutdown: &ShutdownFlag,
    idle: &mut IdleWait,
) -> bool {
    loop {
        match producer.push(value) {
            Ok(()) => return true,
            Err(PushError::Full(v)) => {
                if shutdown.is_raised() {
                    return false;
                }
                value = v;
                idle.idle();
            }
        }
    }
}

// ============================================================================
// Stage loops
// ============================================================================

/// Stage 1: receive datagrams, stamp them, hand them to the parser.
///
/// The socket must be non-blocking. A full ring drops the datagram (the
/// transport gives no delivery guarantee anyway); drops are counted and
/// surfaced periodically.
pub fn ingest_loop(
    socket: &UdpSocket,
    out: &mut Producer<RawPacket>,
    shutdown: &ShutdownFlag,
    policy: BackoffPolicy,
) {
    let mut idle = IdleWait::new(policy);
    let mut buf = [0u8; MAX_DATAGRAM];
    let mut dropped: u64 = 0;

    while !shutdown.is_raised() {
        match socket.recv_from(&mut buf) {
            Ok((n, _from)) => {
                let packet = RawPacket::new(&buf[..n], now_nanos());
                if out.push(packet).is_err() {
                    dropped += 1;
                    if dropped % 10_000 == 1 {
                        warn!("ingest: raw ring full, dropped={}", dropped);
                    }
                }
                idle.reset();
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => idle.idle(),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                error!("ingest: recv failed: {}", e);
                shutdown.raise();
            }
        }
    }
}

/// Stage 2: raw bytes into structured requests. Malformed lines die here.
pub fn parse_loop(
    input: &mut Consumer<RawPacket>,
    out: &mut Producer<ParsedRequest>,
    shutdown: &ShutdownFlag,
    policy: BackoffPolicy,
) {
    let mut idle = IdleWait::new(policy);

    loop {
        match input.pop() {
            Ok(packet) => {
                if let Some(msg) = parse_line(packet.payload(), packet.recv_nanos) {
                    if !push_or_wait(out, msg, shutdown, &mut idle) {
                        return;
                    }
                }
                idle.reset();
            }
            Err(_) => {
                if shutdown.is_raised() {
                    return;
                }
                idle.idle();
            }
        }
    }
}

/// Stage 3: the single writer. Owns the registry and every book; applies
/// requests in arrival order and forwards the resulting events.
///
/// Pool exhaustion is a sizing bug: the stage raises shutdown and returns
/// the error so the process can terminate with a diagnostic.
pub fn match_loop(
    input: &mut Consumer<ParsedRequest>,
    out: &mut Producer<MarketData>,
    registry: &mut BookRegistry,
    shutdown: &ShutdownFlag,
    policy: BackoffPolicy,
) -> Result<(), BookError> {
    let mut idle = IdleWait::new(policy);
    // Reused per request; events drain into the ring before the next pop
    let mut events: Vec<MarketData> = Vec::with_capacity(64);

    loop {
        match input.pop() {
            Ok(msg) => {
                events.clear();
                match registry.process(&msg.request, &mut events) {
                    Ok(()) => {}
                    Err(BookError::ZeroQuantity) => {
                        warn!("dropping zero-quantity order: {:?}", msg.request);
                        continue;
                    }
                    Err(err @ BookError::PoolExhausted { .. }) => {
                        error!("fatal: {} - resize the order pool for the target load", err);
                        shutdown.raise();
                        return Err(err);
                    }
                }
                for event in events.drain(..) {
                    if !push_or_wait(out, event, shutdown, &mut idle) {
                        return Ok(());
                    }
                }
                idle.reset();
            }
            Err(_) => {
                if shutdown.is_raised() {
                    return Ok(());
                }
                idle.idle();
            }
        }
    }
}

/// Stage 4: render events in order.
pub fn publish_loop(
    input: &mut Consumer<MarketData>,
    shutdown: &ShutdownFlag,
    policy: BackoffPolicy,
) {
    let mut idle = IdleWait::new(policy);

    loop {
        match input.pop() {
            Ok(data) => {
                publisher::publish(&data);
                idle.reset();
            }
            Err(_) => {
                if shutdown.is_raised() {
                    return;
                }
                idle.idle();
            }
        }
    }
}
