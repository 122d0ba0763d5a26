//! Prometheus metrics for a Thrift source
//!
//! Every listener owns its own [`prometheus::Registry`], so several bridges
//! in one process keep separate counters. Hosts that run a scrape endpoint
//! can render [`SourceMetrics::gather`] or register [`SourceMetrics::registry`]
//! collectors into their own registry.

use crate::error::{BridgeError, Result};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

/// Counters for one listener
#[derive(Clone)]
pub struct SourceMetrics {
    registry: Registry,

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────
    /// `append` calls received
    pub append_received: IntCounter,
    /// `append` calls whose event reached the channel
    pub append_accepted: IntCounter,
    /// `appendBatch` calls received
    pub append_batch_received: IntCounter,
    /// `appendBatch` calls whose events all reached the channel
    pub append_batch_accepted: IntCounter,

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────
    /// Events decoded from either call
    pub events_received: IntCounter,
    /// Events delivered to the channel
    pub events_accepted: IntCounter,
    /// Calls answered with `FAILED` because the channel refused
    pub channel_write_fail: IntCounter,

    // ─────────────────────────────────────────────────────────────────────────
    // Connections
    // ─────────────────────────────────────────────────────────────────────────
    /// Currently open client connections
    pub connections_open: IntGauge,
    /// Connections accepted since start
    pub connections_total: IntCounter,
    /// Frames that could not be decoded
    pub malformed_frames: IntCounter,
}

impl SourceMetrics {
    /// Create counters in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("flume_bridge".to_string()), None)
            .map_err(metrics_error)?;

        let append_received = counter(&registry, "append_received_total", "append calls received")?;
        let append_accepted = counter(
            &registry,
            "append_accepted_total",
            "append calls delivered to the channel",
        )?;
        let append_batch_received = counter(
            &registry,
            "append_batch_received_total",
            "appendBatch calls received",
        )?;
        let append_batch_accepted = counter(
            &registry,
            "append_batch_accepted_total",
            "appendBatch calls delivered to the channel",
        )?;
        let events_received = counter(&registry, "events_received_total", "events decoded")?;
        let events_accepted = counter(
            &registry,
            "events_accepted_total",
            "events delivered to the channel",
        )?;
        let channel_write_fail = counter(
            &registry,
            "channel_write_fail_total",
            "calls refused by the channel",
        )?;
        let connections_total = counter(
            &registry,
            "connections_total",
            "client connections accepted",
        )?;
        let malformed_frames = counter(
            &registry,
            "malformed_frames_total",
            "frames that failed to decode",
        )?;

        let connections_open =
            IntGauge::with_opts(Opts::new("connections_open", "open client connections"))
                .map_err(metrics_error)?;
        registry
            .register(Box::new(connections_open.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            append_received,
            append_accepted,
            append_batch_received,
            append_batch_accepted,
            events_received,
            events_accepted,
            channel_write_fail,
            connections_open,
            connections_total,
            malformed_frames,
        })
    }

    /// The registry holding these counters
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all counters in Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help)).map_err(metrics_error)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(metrics_error)?;
    Ok(counter)
}

fn metrics_error(e: prometheus::Error) -> BridgeError {
    BridgeError::Metrics(e.to_string())
}
