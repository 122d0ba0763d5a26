//! Delivery channels for the Thrift listener
//!
//! The listener never talks to a publisher directly. It hands every decoded
//! event to a [`ChannelProcessor`], which replicates it to the channels its
//! selector returns. A channel is the dual push/pull shape Flume sources
//! expect:
//!
//! ```text
//! ThriftSource ──► ChannelProcessor ──► ReplicatingSelector ──► [Channel]
//!                                                                 │
//!                                                    SinkAdapter ─┴─► Publisher
//! ```
//!
//! The bridge wires exactly one [`SinkAdapter`], so the fan-out degenerates
//! to a single hop; the shape is kept so any [`Channel`] can be a delivery
//! target.

mod processor;
mod sink;

pub use processor::{ChannelProcessor, ChannelSelector, ReplicatingSelector};
pub use sink::SinkAdapter;

use flume_bridge_core::{Event, PublishError};
use thiserror::Error;

/// Error returned by channel operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The publisher behind the channel refused the payload
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Unit of work around a channel operation
///
/// Every method defaults to a trivial success.
pub trait Transaction: Send {
    /// Begin the unit of work
    fn begin(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Make the work visible
    fn commit(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Undo the work
    fn rollback(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Release the transaction
    fn close(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Transaction that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTransaction;

impl Transaction for NoOpTransaction {}

/// Delivery target of the listener
pub trait Channel: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    /// Push one event into the channel
    fn put(&self, event: Event) -> Result<(), ChannelError>;

    /// Pull one event from the channel
    fn take(&self) -> Result<Option<Event>, ChannelError>;

    /// Open a transaction for a put or take
    fn transaction(&self) -> Box<dyn Transaction + '_>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_transaction_all_succeed() {
        let mut tx = NoOpTransaction;
        assert!(tx.begin().is_ok());
        assert!(tx.commit().is_ok());
        assert!(tx.rollback().is_ok());
        assert!(tx.close().is_ok());
    }

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::Publish(PublishError::Full);
        assert_eq!(err.to_string(), "publish failed: channel full");
    }
}
