//! flume-bridge runtime: process wiring for a bridge
//!
//! Provides [`run()`] for zero-boilerplate startup, and [`RuntimeBuilder`]
//! for hosts that want to override the listener address or protocol.
//!
//! # Quick start
//!
//! ```ignore
//! use flume_bridge_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     flume_bridge_runtime::run(LoggingPublisher::new()).await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use flume_bridge::config::{Config, LogFormat, Protocol};
use flume_bridge::Bridge;
use flume_bridge_core::Publisher;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run a bridge with settings from the environment.
///
/// Loads configuration from `FLUME_BRIDGE_*` variables, initialises
/// tracing, starts the listener, and republishes every event body into
/// `publisher` until SIGINT or SIGTERM.
///
/// # Example
///
/// ```ignore
/// let (tx, mut rx) = tokio::sync::mpsc::channel::<Bytes>(1024);
/// tokio::spawn(async move {
///     while let Some(payload) = rx.recv().await {
///         println!("{} bytes", payload.len());
///     }
/// });
/// flume_bridge_runtime::run(tx).await
/// ```
pub async fn run(publisher: impl Publisher + 'static) -> anyhow::Result<()> {
    RuntimeBuilder::new().run(publisher).await
}

/// Builder for overriding environment settings.
///
/// # Example
///
/// ```ignore
/// RuntimeBuilder::new()
///     .bind("0.0.0.0")
///     .port(4545)
///     .protocol(Protocol::Binary)
///     .run(LoggingPublisher::new().full_message(true))
///     .await
/// ```
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    bind: Option<String>,
    port: Option<u16>,
    protocol: Option<Protocol>,
}

impl RuntimeBuilder {
    /// Create a builder; unset fields come from the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bind address.
    ///
    /// Default: `FLUME_BRIDGE_BIND`, or `127.0.0.1`.
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = Some(bind.into());
        self
    }

    /// Override the listen port.
    ///
    /// Default: `FLUME_BRIDGE_PORT`, or `4141`.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Override the Thrift protocol.
    ///
    /// Default: `FLUME_BRIDGE_PROTOCOL`, or compact.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Start the bridge and run it until a shutdown signal.
    ///
    /// This is the terminal method.
    pub async fn run(self, publisher: impl Publisher + 'static) -> anyhow::Result<()> {
        // ── 1. Load config from env ──────────────────────────────
        let config = Config::from_env()?;

        // ── 2. Init tracing ──────────────────────────────────────
        init_tracing(&config);

        // ── 3. Apply overrides ───────────────────────────────────
        let mut bridge_config = config.bridge;
        if let Some(bind) = self.bind {
            bridge_config.bind = bind;
        }
        if let Some(port) = self.port {
            bridge_config.port = port;
        }
        if let Some(protocol) = self.protocol {
            bridge_config.protocol = protocol;
        }

        info!(
            addr = %bridge_config.address(),
            protocol = %bridge_config.protocol,
            max_connections = bridge_config.max_connections,
            "Starting flume-bridge"
        );

        // ── 4. Build and start the bridge ────────────────────────
        let mut bridge = Bridge::new(publisher);
        bridge.configure_with(bridge_config)?;
        bridge.initialize()?;
        bridge.start().await?;

        // ── 5. Wait, then shut down ──────────────────────────────
        shutdown_signal().await;
        bridge.stop().await;

        if let Some(metrics) = bridge.metrics() {
            info!(
                events_received = metrics.events_received.get(),
                events_accepted = metrics.events_accepted.get(),
                channel_write_fail = metrics.channel_write_fail.get(),
                "flume-bridge shutdown complete"
            );
        }

        Ok(())
    }
}

/// Initialise the tracing subscriber based on config.
///
/// `RUST_LOG` wins over `FLUME_BRIDGE_LOG_LEVEL`. Does nothing if the host
/// already installed a subscriber.
pub fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
