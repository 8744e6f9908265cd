use serde::Deserialize;
use std::{fs, path::Path};

use crate::pipeline::BackoffPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: Server,
    pub queues: Queues,
    pub pools: Pools,
    pub cpu: Cpu,
    pub backoff: Backoff,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    /// UDP bind address for the order entry socket
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Queues {
    pub raw_capacity: usize,     // ingest -> parse
    pub request_capacity: usize, // parse -> match
    pub event_capacity: usize,   // match -> publish
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pools {
    /// Order slots per book; exceeding this is fatal
    pub order_pool_size: usize,
    /// Books pre-constructed at startup
    pub book_pool_size: usize,
    /// Pre-fault pool pages before accepting traffic
    pub warm_up: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cpu {
    pub ingest_core: Option<usize>,
    pub parse_core: Option<usize>,
    pub match_core: Option<usize>,
    pub publish_core: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Backoff {
    /// "spin" or "spin_then_sleep"
    pub kind: String,
    pub spin_loops: u32,
    pub sleep_micros: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 12345,
        }
    }
}

impl Default for Queues {
    fn default() -> Self {
        Self {
            raw_capacity: 65_536,
            request_capacity: 65_536,
            event_capacity: 262_144,
        }
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self {
            order_pool_size: 65_536,
            book_pool_size: 64,
            warm_up: true,
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self {
            ingest_core: None,
            parse_core: None,
            match_core: None,
            publish_core: None,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            kind: "spin_then_sleep".to_string(),
            spin_loops: 64,
            sleep_micros: 50,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: Server::default(),
            queues: Queues::default(),
            pools: Pools::default(),
            cpu: Cpu::default(),
            backoff: Backoff::default(),
        }
    }
}

impl AppConfig {
    pub fn from_file(p: &Path) -> anyhow::Result<Self> {
        let s = fs::read_to_string(p)?;
        let cfg: AppConfig = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queues.raw_capacity == 0
            || self.queues.request_capacity == 0
            || self.queues.event_capacity == 0
        {
            anyhow::bail!("queue capacities must be > 0");
        }
        if self.pools.order_pool_size == 0 {
            anyhow::bail!("pools.order_pool_size must be > 0");
        }
        if self.pools.book_pool_size == 0 {
            anyhow::bail!("pools.book_pool_size must be > 0");
        }
        match self.backoff.kind.as_str() {
            "spin" | "spin_then_sleep" => {}
            other => anyhow::bail!("backoff.kind must be \"spin\" or \"spin_then_sleep\", got {:?}", other),
        }
        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        match self.backoff.kind.as_str() {
            "spin" => BackoffPolicy::Spin {
                loops: self.backoff.spin_loops,
            },
            _ => BackoffPolicy::SpinThenSleep {
                loops: self.backoff.spin_loops,
                sleep_micros: self.backoff.sleep_micros,
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
