//! Thrift RPC source
//!
//! Binds a TCP listener speaking Flume's `ThriftSourceProtocol` and hands
//! every decoded event to a [`ChannelProcessor`]. Each accepted client is
//! served on its own task; events from one connection are delivered in the
//! order they were sent.
//!
//! ```text
//! TcpListener ──► connection task ──► Dispatcher ──► ChannelProcessor
//!      ▲                                  │
//!      └──────── reply frame ◄────────────┘
//! ```

mod connection;

use crate::bridge::BridgeState;
use crate::channel::ChannelProcessor;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::metrics::SourceMetrics;
use connection::{serve_connection, Dispatcher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long connections get to wind down before they are aborted
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// A listener bound to one address
pub struct ThriftSource {
    config: BridgeConfig,
    dispatcher: Arc<Dispatcher>,
    running: Option<Running>,
}

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl ThriftSource {
    /// Create a source that will deliver into `processor`
    ///
    /// Nothing is bound until [`ThriftSource::start`].
    pub fn new(config: BridgeConfig, processor: ChannelProcessor) -> Result<Self> {
        config.validate()?;
        let dispatcher = Dispatcher {
            protocol: config.protocol,
            max_frame_size: config.max_frame_size,
            processor,
            metrics: SourceMetrics::new()?,
        };

        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
            running: None,
        })
    }

    /// Bind the configured address and start accepting clients
    ///
    /// Returns the address actually bound.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.running.is_some() {
            return Err(BridgeError::IllegalState {
                operation: "start",
                state: BridgeState::Running,
            });
        }

        let addr = self.config.address();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| BridgeError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let limiter = match self.config.max_connections {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.dispatcher),
            limiter,
            shutdown_rx,
        ));

        info!(
            addr = %local_addr,
            protocol = %self.config.protocol,
            max_connections = self.config.max_connections,
            "Thrift source listening"
        );

        self.running = Some(Running {
            local_addr,
            shutdown_tx,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Stop accepting, close client connections, and release the port
    ///
    /// Does nothing when the source is not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown_tx.send(true);
        if let Err(e) = running.accept_task.await {
            warn!(error = %e, "Accept task ended abnormally");
        }

        info!(addr = %running.local_addr, "Thrift source stopped");
    }

    /// Whether the listener is bound
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Counters for this source
    pub fn metrics(&self) -> &SourceMetrics {
        &self.dispatcher.metrics
    }

    /// Configuration the source was built with
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl std::fmt::Debug for ThriftSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThriftSource")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Resolves once shutdown is requested or the source is dropped
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // Returns immediately if the flag was already set before this receiver looked
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    limiter: Option<Arc<Semaphore>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    dispatcher.metrics.connections_total.inc();
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&dispatcher),
                        limiter.clone(),
                        shutdown_rx.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    // Release the port before waiting on clients
    drop(listener);

    let open = connections.len();
    if open > 0 {
        debug!(connections = open, "Closing client connections");
    }
    let drained = tokio::time::timeout(CLOSE_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            connections = connections.len(),
            "Connections did not close in time, aborting"
        );
        connections.shutdown().await;
    }
}
