use clap::Parser;
use serde::Deserialize;
use std::{fs::read_to_string, net::SocketAddr, time::Duration};

#[derive(Deserialize, Debug)]
pub struct Server {
    /// Server name returned in the ServInfo reply's Param.
    #[serde(default = "Server::name")]
    pub name: String,

    /// Address the normal (TCP) channel listens on; the quick (UDP) channel
    /// binds the same address.
    #[serde(default = "Server::listen")]
    pub listen: SocketAddr,

    /// Empty string accepts any password (§4.4 ServInfo handler).
    #[serde(default)]
    pub password: String,

    /// Whether `OnClient` marks a client authed by default.
    #[serde(default)]
    pub auto_auth: bool,

    #[serde(default = "Server::ping_interval")]
    pub ping_interval: u32,
    #[serde(default = "Server::ping_timeout")]
    pub ping_timeout: u32,
    #[serde(default = "Server::ping_lost")]
    pub ping_lost: u32,

    /// Idle read deadline per connection, before the first ServInfo and
    /// between subsequent messages (§4.4).
    #[serde(default = "Server::read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Thread/worker count; defaults to the host's CPU count, matching the
    /// teacher's UDP worker sizing.
    #[serde(default = "num_cpus::get")]
    pub threads: usize,
}

impl Server {
    fn name() -> String {
        "rust VSOA server".to_string()
    }

    fn listen() -> SocketAddr {
        "0.0.0.0:3000".parse().unwrap()
    }

    fn ping_interval() -> u32 {
        5
    }

    fn ping_timeout() -> u32 {
        3
    }

    fn ping_lost() -> u32 {
        3
    }

    fn read_timeout_secs() -> u64 {
        300
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            name: Self::name(),
            listen: Self::listen(),
            password: String::new(),
            auto_auth: true,
            ping_interval: Self::ping_interval(),
            ping_timeout: Self::ping_timeout(),
            ping_lost: Self::ping_lost(),
            read_timeout_secs: Self::read_timeout_secs(),
            threads: num_cpus::get(),
        }
    }
}

/// If present, this server also hosts the position directory (§4.8) and
/// registers itself in it on startup under `name` — what clients look this
/// server up by.
#[derive(Deserialize, Debug, Clone)]
pub struct Position {
    pub directory: SocketAddr,
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub security: bool,
}

#[derive(Deserialize, Debug)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    pub position: Option<Position>,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: Server::default(),
            position: None,
            log: Log::default(),
        }
    }
}

#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
struct Cli {
    /// specify the configuration file path.
    #[arg(long)]
    config: Option<String>,
}

impl Config {
    /// Load command line parameters; if a configuration file path is given
    /// its contents are parsed as JSON5, otherwise all defaults apply.
    pub fn load() -> anyhow::Result<Self> {
        let cfg_str = Cli::parse()
            .config
            .map(|path| read_to_string(path))
            .transpose()?
            .unwrap_or_default();

        if cfg_str.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_json5::from_str(&cfg_str)?)
    }
}
