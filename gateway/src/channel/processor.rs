//! Channel processor - replicates events to the selected channels

use super::{Channel, ChannelError};
use flume_bridge_core::Event;
use std::sync::Arc;
use tracing::warn;

/// Picks the channels an event must be delivered to
pub trait ChannelSelector: Send + Sync {
    /// Channels that must accept the event for delivery to succeed
    fn required_channels(&self, event: &Event) -> &[Arc<dyn Channel>];

    /// Every channel this selector knows about
    fn all_channels(&self) -> &[Arc<dyn Channel>];
}

/// Selector that sends every event to every channel
pub struct ReplicatingSelector {
    channels: Vec<Arc<dyn Channel>>,
}

impl ReplicatingSelector {
    /// Create a selector over `channels`
    pub fn new(channels: Vec<Arc<dyn Channel>>) -> Self {
        Self { channels }
    }

    /// Selector over a single channel
    pub fn single(channel: Arc<dyn Channel>) -> Self {
        Self::new(vec![channel])
    }
}

impl ChannelSelector for ReplicatingSelector {
    fn required_channels(&self, _event: &Event) -> &[Arc<dyn Channel>] {
        &self.channels
    }

    fn all_channels(&self) -> &[Arc<dyn Channel>] {
        &self.channels
    }
}

/// Delivers events from a source into its channels
///
/// Each put runs inside the channel's transaction. The first failing
/// channel aborts delivery and its error is returned unchanged.
pub struct ChannelProcessor {
    selector: Box<dyn ChannelSelector>,
}

impl ChannelProcessor {
    /// Create a processor driven by `selector`
    pub fn new(selector: impl ChannelSelector + 'static) -> Self {
        Self {
            selector: Box::new(selector),
        }
    }

    /// Number of channels behind this processor
    pub fn channel_count(&self) -> usize {
        self.selector.all_channels().len()
    }

    /// Deliver one event
    pub fn process_event(&self, event: Event) -> Result<(), ChannelError> {
        let channels = self.selector.required_channels(&event);
        let Some((last, rest)) = channels.split_last() else {
            return Ok(());
        };

        for channel in rest {
            deliver(channel.as_ref(), std::iter::once(event.clone()))?;
        }
        deliver(last.as_ref(), std::iter::once(event))
    }

    /// Deliver a batch, preserving order within each channel
    ///
    /// Each channel receives the whole batch in one transaction.
    pub fn process_event_list(&self, events: Vec<Event>) -> Result<(), ChannelError> {
        let Some(first) = events.first() else {
            return Ok(());
        };
        let channels = self.selector.required_channels(first);
        let Some((last, rest)) = channels.split_last() else {
            return Ok(());
        };

        for channel in rest {
            deliver(channel.as_ref(), events.iter().cloned())?;
        }
        deliver(last.as_ref(), events)
    }
}

fn deliver<I>(channel: &dyn Channel, events: I) -> Result<(), ChannelError>
where
    I: IntoIterator<Item = Event>,
{
    let mut tx = channel.transaction();
    tx.begin()?;

    for event in events {
        if let Err(e) = channel.put(event) {
            if let Err(rollback) = tx.rollback() {
                warn!(channel = channel.name(), error = %rollback, "Rollback failed");
            }
            if let Err(close) = tx.close() {
                warn!(channel = channel.name(), error = %close, "Transaction close failed");
            }
            return Err(e);
        }
    }

    tx.commit()?;
    tx.close()
}
