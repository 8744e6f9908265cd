use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use log::{error, info};

use matchbook::config::AppConfig;
use matchbook::pipeline::{
    ingest_loop, match_loop, parse_loop, pin_to_core, publish_loop, ShutdownFlag,
};
use matchbook::registry::BookRegistry;

/// Matching venue: UDP order entry in, market data events out.
#[derive(Parser, Debug)]
#[command(name = "matchbook-server", version, about)]
struct Args {
    /// Path to the TOML config; defaults apply if the file is absent
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = if args.config.exists() {
        AppConfig::from_file(&args.config)?
    } else {
        info!("config {:?} not found, using defaults", args.config);
        AppConfig::default()
    };
    info!("loaded config: {:?}", cfg);

    let shutdown = Arc::new(ShutdownFlag::default());
    {
        let s = shutdown.clone();
        ctrlc::set_handler(move || {
            s.raise();
        })?;
    }

    let socket = UdpSocket::bind(cfg.bind_addr())?;
    socket.set_nonblocking(true)?;
    info!("order entry listening on {}", socket.local_addr()?);

    let mut registry = BookRegistry::new(cfg.pools.order_pool_size as u32, cfg.pools.book_pool_size);
    if cfg.pools.warm_up {
        registry.warm_up();
        info!(
            "warm-up complete: {} books x {} order slots",
            cfg.pools.book_pool_size, cfg.pools.order_pool_size
        );
    }

    let (mut raw_tx, mut raw_rx) = rtrb::RingBuffer::new(cfg.queues.raw_capacity);
    let (mut req_tx, mut req_rx) = rtrb::RingBuffer::new(cfg.queues.request_capacity);
    let (mut evt_tx, mut evt_rx) = rtrb::RingBuffer::new(cfg.queues.event_capacity);

    let policy = cfg.backoff_policy();
    let cpu = cfg.cpu.clone();

    let ingest_shutdown = shutdown.clone();
    let t_ingest = thread::Builder::new().name("ingest".into()).spawn(move || {
        pin_to_core(cpu.ingest_core);
        ingest_loop(&socket, &mut raw_tx, &ingest_shutdown, policy);
    })?;

    let parse_shutdown = shutdown.clone();
    let parse_core = cfg.cpu.parse_core;
    let t_parse = thread::Builder::new().name("parse".into()).spawn(move || {
        pin_to_core(parse_core);
        parse_loop(&mut raw_rx, &mut req_tx, &parse_shutdown, policy);
    })?;

    let match_shutdown = shutdown.clone();
    let match_core = cfg.cpu.match_core;
    let t_match = thread::Builder::new().name("match".into()).spawn(move || {
        pin_to_core(match_core);
        if let Err(e) = match_loop(&mut req_rx, &mut evt_tx, &mut registry, &match_shutdown, policy)
        {
            error!("match stage failed: {e}");
        }
    })?;

    let publish_shutdown = shutdown.clone();
    let publish_core = cfg.cpu.publish_core;
    let t_publish = thread::Builder::new().name("publish".into()).spawn(move || {
        pin_to_core(publish_core);
        publish_loop(&mut evt_rx, &publish_shutdown, policy);
    })?;

    if t_ingest.join().is_err() {
        error!("ingest thread panicked");
    }
    if t_parse.join().is_err() {
        error!("parse thread panicked");
    }
    if t_match.join().is_err() {
        error!("match thread panicked");
    }
    if t_publish.join().is_err() {
        error!("publish thread panicked");
    }
    info!("clean shutdown");
    Ok(())
}
