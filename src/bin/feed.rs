//! Replay client: reads a request file and fires each line at the venue
//! over UDP, prefixing the current nanosecond timestamp.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::UdpSocket;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{info, warn};

use matchbook::pipeline::now_nanos;

#[derive(Parser, Debug)]
#[command(name = "matchbook-feed", version, about)]
struct Args {
    /// Request file: one wire message per line, `#` comments allowed.
    /// Lines are sent without the leading timestamp field; it is added
    /// at send time.
    input: PathBuf,

    /// Venue address
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    target: String,

    /// Pause between messages, in microseconds (0 = flat out)
    #[arg(short, long, default_value_t = 0)]
    pace_micros: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(&args.target)?;

    let file = File::open(&args.input)?;
    let reader = BufReader::new(file);

    let mut sent: u64 = 0;
    for line in reader.lines() {
        let line = line?;
        let body: String = line.chars().filter(|c| *c != ' ').collect();
        if body.is_empty() || body.starts_with('#') {
            continue;
        }

        let message = format!("{},{}", now_nanos(), body);
        if let Err(e) = socket.send(message.as_bytes()) {
            warn!("send failed, skipping line: {}", e);
            continue;
        }
        sent += 1;

        if args.pace_micros > 0 {
            std::thread::sleep(Duration::from_micros(args.pace_micros));
        }
    }

    info!("all messages sent: {}", sent);
    Ok(())
}
