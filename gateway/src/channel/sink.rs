//! Sink adapter - the channel that forwards into a publisher

use super::{Channel, ChannelError, NoOpTransaction, Transaction};
use flume_bridge_core::{Event, Publisher};
use std::sync::Arc;
use tracing::trace;

/// Push-only channel that publishes each event body
///
/// `put` hands the body to the publisher on the calling task, unchanged.
/// Headers are dropped here. `take` is always empty and transactions are
/// no-ops: delivery guarantees belong to the publisher and the sender.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use flume_bridge::channel::{Channel, SinkAdapter};
/// use flume_bridge::publish::QueueChannel;
/// use flume_bridge_core::Event;
/// use std::sync::Arc;
///
/// let queue = Arc::new(QueueChannel::new());
/// let sink = SinkAdapter::new(queue.clone());
///
/// sink.put(Event::new(Bytes::from_static(b"testing"))).unwrap();
/// assert_eq!(queue.receive(), Some(Bytes::from_static(b"testing")));
/// ```
pub struct SinkAdapter {
    publisher: Arc<dyn Publisher>,
}

impl SinkAdapter {
    /// Create an adapter forwarding to `publisher`
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

impl Channel for SinkAdapter {
    fn name(&self) -> &str {
        "sink-adapter"
    }

    fn put(&self, event: Event) -> Result<(), ChannelError> {
        let body = event.into_body();
        trace!(bytes = body.len(), "Publishing event body");
        self.publisher.publish(body)?;
        Ok(())
    }

    fn take(&self) -> Result<Option<Event>, ChannelError> {
        Ok(None)
    }

    fn transaction(&self) -> Box<dyn Transaction + '_> {
        Box::new(NoOpTransaction)
    }
}
