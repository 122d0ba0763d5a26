//! Logging publisher for debugging
//!
//! Writes each payload to the `tracing` log. Useful for development and
//! for checking that a Flume agent is wired to the bridge.

use bytes::Bytes;
use flume_bridge_core::{PublishError, Publisher};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Publisher that logs payloads
pub struct LoggingPublisher {
    /// Value of the `logger` field on each record
    logger: String,
    /// Log the payload text, not just its size
    full_message: bool,
    /// Count of payloads logged
    published_count: AtomicU64,
}

impl LoggingPublisher {
    /// Log payload sizes under the `flume-bridge` logger name
    pub fn new() -> Self {
        Self::named("flume-bridge")
    }

    /// Log payload sizes under the given logger name
    pub fn named(logger: impl Into<String>) -> Self {
        Self {
            logger: logger.into(),
            full_message: false,
            published_count: AtomicU64::new(0),
        }
    }

    /// Also log the payload as (lossy) UTF-8 text
    pub fn full_message(mut self, enabled: bool) -> Self {
        self.full_message = enabled;
        self
    }

    /// Total payloads logged
    pub fn published_count(&self) -> u64 {
        self.published_count.load(Ordering::Relaxed)
    }
}

impl Default for LoggingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for LoggingPublisher {
    fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        if self.full_message {
            info!(
                logger = %self.logger,
                bytes = payload.len(),
                payload = %String::from_utf8_lossy(&payload),
                "Received event"
            );
        } else {
            info!(logger = %self.logger, bytes = payload.len(), "Received event");
        }
        self.published_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
