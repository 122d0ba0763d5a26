//! Lifecycle-managed bridge
//!
//! Owns one Thrift listener and routes every event it receives into a
//! host-supplied [`Publisher`]:
//!
//! ```text
//! Flume client ──► ThriftSource ──► ChannelProcessor ──► SinkAdapter ──► Publisher
//! ```
//!
//! The lifecycle is a small state machine:
//!
//! ```text
//! Uninitialized ──initialize──► Initialized ──start──► Running ──stop──► Stopped
//!                                    ▲                                     │
//!                                    └──────────── initialize ─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use flume_bridge::{Bridge, QueueChannel};
//! use std::sync::Arc;
//!
//! # async fn example() -> flume_bridge::Result<()> {
//! let queue = Arc::new(QueueChannel::new());
//! let mut bridge = Bridge::new(queue.clone());
//! bridge.configure("127.0.0.1", 4141)?;
//! bridge.initialize()?;
//! bridge.start().await?;
//! // ... Flume clients append events, bodies show up in `queue` ...
//! bridge.stop().await;
//! # Ok(())
//! # }
//! ```

use crate::channel::{Channel, ChannelProcessor, ReplicatingSelector, SinkAdapter};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::metrics::SourceMetrics;
use crate::source::ThriftSource;
use flume_bridge_core::Publisher;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Where a bridge is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeState {
    /// Created, nothing built yet
    Uninitialized,
    /// Pipeline built, nothing bound
    Initialized,
    /// Listener bound and accepting
    Running,
    /// Listener released
    Stopped,
}

impl BridgeState {
    /// Lowercase name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeState::Uninitialized => "uninitialized",
            BridgeState::Initialized => "initialized",
            BridgeState::Running => "running",
            BridgeState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flume Thrift listener wired to a publisher
pub struct Bridge {
    config: BridgeConfig,
    publisher: Arc<dyn Publisher>,
    source: Option<ThriftSource>,
    state: BridgeState,
}

impl Bridge {
    /// Create a bridge that republishes into `publisher`
    ///
    /// The listener address defaults to `127.0.0.1:4141` until configured.
    pub fn new(publisher: impl Publisher + 'static) -> Self {
        Self::with_config(publisher, BridgeConfig::default())
    }

    /// Create a bridge with a prepared config
    pub fn with_config(publisher: impl Publisher + 'static, config: BridgeConfig) -> Self {
        Self {
            config,
            publisher: Arc::new(publisher),
            source: None,
            state: BridgeState::Uninitialized,
        }
    }

    /// Set the bind address and port
    ///
    /// Ports outside 1-65535 are rejected and leave the config unchanged.
    /// Takes effect at the next [`Bridge::initialize`].
    pub fn configure(&mut self, bind: impl Into<String>, port: u32) -> Result<()> {
        self.ensure_not_running("configure")?;
        self.config.set_address(bind, port)?;
        debug!(addr = %self.config.address(), "Bridge address configured");
        Ok(())
    }

    /// Replace the whole listener config
    pub fn configure_with(&mut self, config: BridgeConfig) -> Result<()> {
        self.ensure_not_running("configure")?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Overlay Flume-style properties (`bind`, `port`, `protocol`, ...)
    pub fn configure_properties(&mut self, props: &HashMap<String, String>) -> Result<()> {
        self.ensure_not_running("configure")?;
        self.config.apply_properties(props)
    }

    /// Build the pipeline: sink adapter, processor, and listener
    ///
    /// Valid from any state except `Running`. Re-initializing after a stop
    /// picks up config changes made in between.
    ///
    /// # Errors
    ///
    /// [`BridgeError::IllegalState`] while `Running`. This is stricter than
    /// Flume's adapter, which lets a running component be re-initialized;
    /// here the listener must be stopped first so its port is never
    /// orphaned.
    pub fn initialize(&mut self) -> Result<()> {
        self.ensure_not_running("initialize")?;

        let sink: Arc<dyn Channel> = Arc::new(SinkAdapter::new(Arc::clone(&self.publisher)));
        let processor = ChannelProcessor::new(ReplicatingSelector::single(sink));
        let source = ThriftSource::new(self.config.clone(), processor)?;

        self.source = Some(source);
        self.state = BridgeState::Initialized;
        info!(addr = %self.config.address(), protocol = %self.config.protocol, "Bridge initialized");
        Ok(())
    }

    /// Bind the listener and begin accepting events
    ///
    /// Only valid once initialized. A bind failure leaves the bridge
    /// `Initialized` so it can be reconfigured and retried.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != BridgeState::Initialized {
            return Err(self.illegal("start"));
        }
        let source = self.source.as_mut().ok_or(BridgeError::IllegalState {
            operation: "start",
            state: self.state,
        })?;

        let addr = source.start().await?;
        self.state = BridgeState::Running;
        info!(%addr, "Bridge running");
        Ok(())
    }

    /// Stop the listener and release its port
    ///
    /// Never fails. Outside `Running` this does nothing.
    pub async fn stop(&mut self) {
        if self.state != BridgeState::Running {
            debug!(state = %self.state, "Stop ignored, bridge not running");
            return;
        }

        if let Some(source) = self.source.as_mut() {
            source.stop().await;
        }
        self.state = BridgeState::Stopped;
        info!("Bridge stopped");
    }

    /// Current lifecycle state
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Whether the listener is accepting
    pub fn is_running(&self) -> bool {
        self.state == BridgeState::Running
    }

    /// Config used by the next [`Bridge::initialize`]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.source.as_ref().and_then(ThriftSource::local_addr)
    }

    /// Listener counters, once initialized
    pub fn metrics(&self) -> Option<&SourceMetrics> {
        self.source.as_ref().map(ThriftSource::metrics)
    }

    fn ensure_not_running(&self, operation: &'static str) -> Result<()> {
        if self.state == BridgeState::Running {
            return Err(self.illegal(operation));
        }
        Ok(())
    }

    fn illegal(&self, operation: &'static str) -> BridgeError {
        BridgeError::IllegalState {
            operation,
            state: self.state,
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::publish::QueueChannel;

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(QueueChannel::new()))
    }

    #[test]
    fn test_new_bridge_is_uninitialized() {
        let bridge = bridge();
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
        assert_eq!(bridge.config().address(), "127.0.0.1:4141");
        assert!(bridge.metrics().is_none());
        assert!(bridge.local_addr().is_none());
    }

    #[test]
    fn test_initialize_moves_to_initialized() {
        let mut bridge = bridge();
        bridge.initialize().unwrap();
        assert_eq!(bridge.state(), BridgeState::Initialized);
        assert!(bridge.metrics().is_some());
    }

    #[test]
    fn test_configure_rejects_bad_port_and_keeps_config() {
        let mut bridge = bridge();
        bridge.configure("0.0.0.0", 5000).unwrap();

        for port in [0, 65536, 70000] {
            let err = bridge.configure("10.0.0.1", port).unwrap_err();
            assert!(matches!(err, BridgeError::Config(_)), "port {port}");
        }
        assert_eq!(bridge.config().address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_configure_properties() {
        let mut bridge = bridge();
        let props = HashMap::from([
            ("bind".to_string(), "0.0.0.0".to_string()),
            ("port".to_string(), "4545".to_string()),
            ("protocol".to_string(), "binary".to_string()),
        ]);

        bridge.configure_properties(&props).unwrap();

        assert_eq!(bridge.config().address(), "0.0.0.0:4545");
        assert_eq!(bridge.config().protocol, crate::config::Protocol::Binary);
    }

    #[tokio::test]
    async fn test_start_before_initialize_is_illegal() {
        let mut bridge = bridge();
        let err = bridge.start().await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::IllegalState {
                operation: "start",
                state: BridgeState::Uninitialized
            }
        ));
        assert_eq!(bridge.state(), BridgeState::Uninitialized);
    }

    #[tokio::test]
    async fn test_stop_outside_running_is_noop() {
        let mut bridge = bridge();
        bridge.stop().await;
        assert_eq!(bridge.state(), BridgeState::Uninitialized);

        bridge.initialize().unwrap();
        bridge.stop().await;
        assert_eq!(bridge.state(), BridgeState::Initialized);
    }

    #[test]
    fn test_state_display_is_lowercase() {
        assert_eq!(BridgeState::Running.to_string(), "running");
        assert_eq!(BridgeState::Stopped.as_str(), "stopped");
    }
}
