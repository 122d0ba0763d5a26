//! Bridge configuration
//!
//! [`BridgeConfig`] carries everything the Thrift listener needs: the bind
//! address and port, plus the listener options the Flume Thrift source
//! exposes (`protocol`, `threads`). Host applications either set it through
//! [`Bridge::configure`](crate::Bridge::configure), deserialize it with serde,
//! or pass a Flume-style string property map.
//!
//! [`Config`] is the process-level configuration used by the runtime crate,
//! loaded from `FLUME_BRIDGE_*` environment variables.

use crate::error::{BridgeError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 4141;

/// Default frame size limit (Thrift framed transport default)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16_384_000;

/// Property keys understood by [`BridgeConfig::apply_properties`]
pub mod keys {
    /// Bind address
    pub const BIND: &str = "bind";
    /// Listen port
    pub const PORT: &str = "port";
    /// Thrift protocol (`compact` or `binary`)
    pub const PROTOCOL: &str = "protocol";
    /// Maximum concurrently served connections
    pub const THREADS: &str = "threads";
    /// Maximum accepted frame size in bytes
    pub const MAX_FRAME_SIZE: &str = "max-frame-size";
}

/// Thrift protocol spoken on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCompactProtocol (Flume's default)
    #[default]
    Compact,
    /// TBinaryProtocol
    Binary,
}

impl FromStr for Protocol {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Protocol::Compact),
            "binary" => Ok(Protocol::Binary),
            other => Err(BridgeError::Config(format!(
                "unknown protocol '{other}', expected 'compact' or 'binary'"
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Compact => f.write_str("compact"),
            Protocol::Binary => f.write_str("binary"),
        }
    }
}

/// Listener configuration
///
/// Defaults to `127.0.0.1:4141`, compact protocol, unbounded connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address to bind
    pub bind: String,
    /// Port to listen on (1-65535)
    pub port: u16,
    /// Thrift protocol
    pub protocol: Protocol,
    /// Max concurrently served connections, 0 = unbounded
    pub max_connections: usize,
    /// Largest frame accepted from a client
    pub max_frame_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            protocol: Protocol::default(),
            max_connections: 0,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl BridgeConfig {
    /// Create a config for the given address, other fields default
    pub fn new(bind: impl Into<String>, port: u16) -> Self {
        Self {
            bind: bind.into(),
            port,
            ..Self::default()
        }
    }

    /// Check field invariants
    pub fn validate(&self) -> Result<()> {
        if self.bind.trim().is_empty() {
            return Err(BridgeError::Config("bind address must not be empty".into()));
        }
        if self.port == 0 {
            return Err(BridgeError::Config(
                "port must be between 1 and 65535, got 0".into(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(BridgeError::Config("max frame size must be positive".into()));
        }
        Ok(())
    }

    /// Set bind address and port, rejecting out-of-range ports
    ///
    /// On error the config is left unchanged.
    pub fn set_address(&mut self, bind: impl Into<String>, port: u32) -> Result<()> {
        let port = validate_port(i64::from(port))?;
        let bind = bind.into();
        if bind.trim().is_empty() {
            return Err(BridgeError::Config("bind address must not be empty".into()));
        }
        self.bind = bind;
        self.port = port;
        Ok(())
    }

    /// Build a config from a Flume-style property map
    ///
    /// Keys not present keep their defaults. See [`keys`].
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_properties(props)?;
        Ok(config)
    }

    /// Overlay a Flume-style property map onto this config
    ///
    /// All-or-nothing: if any entry is invalid the config is left unchanged.
    pub fn apply_properties(&mut self, props: &HashMap<String, String>) -> Result<()> {
        let mut next = self.clone();

        for (key, value) in props {
            match key.as_str() {
                keys::BIND => next.bind = value.trim().to_string(),
                keys::PORT => {
                    let raw: i64 = value.trim().parse().map_err(|_| {
                        BridgeError::Config(format!("invalid port '{value}': not a number"))
                    })?;
                    next.port = validate_port(raw)?;
                }
                keys::PROTOCOL => next.protocol = value.parse()?,
                keys::THREADS => {
                    next.max_connections = parse_usize(keys::THREADS, value)?;
                }
                keys::MAX_FRAME_SIZE => {
                    next.max_frame_size = parse_usize(keys::MAX_FRAME_SIZE, value)?;
                }
                other => debug!(key = other, "Ignoring unknown bridge property"),
            }
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// `host:port` string suitable for binding or connecting
    pub fn address(&self) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}

fn validate_port(port: i64) -> Result<u16> {
    if !(1..=i64::from(u16::MAX)).contains(&port) {
        return Err(BridgeError::Config(format!(
            "port must be between 1 and 65535, got {port}"
        )));
    }
    u16::try_from(port).map_err(|e| BridgeError::Config(e.to_string()))
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| BridgeError::Config(format!("invalid {key} '{value}': not a number")))
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(BridgeError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Process configuration for a standalone bridge
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener settings
    pub bridge: BridgeConfig,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load from environment variables
    ///
    /// | variable | default |
    /// |---|---|
    /// | `FLUME_BRIDGE_BIND` | `127.0.0.1` |
    /// | `FLUME_BRIDGE_PORT` | `4141` |
    /// | `FLUME_BRIDGE_PROTOCOL` | `compact` |
    /// | `FLUME_BRIDGE_MAX_CONNECTIONS` | `0` (unbounded) |
    /// | `FLUME_BRIDGE_MAX_FRAME_SIZE` | `16384000` |
    /// | `FLUME_BRIDGE_LOG_LEVEL` | `info` |
    /// | `FLUME_BRIDGE_LOG_FORMAT` | `pretty` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut props = HashMap::new();
        let vars = [
            ("FLUME_BRIDGE_BIND", keys::BIND),
            ("FLUME_BRIDGE_PORT", keys::PORT),
            ("FLUME_BRIDGE_PROTOCOL", keys::PROTOCOL),
            ("FLUME_BRIDGE_MAX_CONNECTIONS", keys::THREADS),
            ("FLUME_BRIDGE_MAX_FRAME_SIZE", keys::MAX_FRAME_SIZE),
        ];
        for (var, key) in vars {
            if let Some(value) = lookup(var) {
                props.insert(key.to_string(), value);
            }
        }

        let mut config = Config {
            bridge: BridgeConfig::from_properties(&props)?,
            ..Config::default()
        };
        if let Some(level) = lookup("FLUME_BRIDGE_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(format) = lookup("FLUME_BRIDGE_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }
        Ok(config)
    }
}
