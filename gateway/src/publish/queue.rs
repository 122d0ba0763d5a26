//! In-memory queue publisher

use bytes::Bytes;
use flume_bridge_core::{PublishError, Publisher};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO of published payloads
///
/// Unbounded by default. A bounded queue rejects payloads with
/// [`PublishError::Full`] once `capacity` are waiting.
#[derive(Debug, Default)]
pub struct QueueChannel {
    queue: Mutex<VecDeque<Bytes>>,
    capacity: Option<usize>,
}

impl QueueChannel {
    /// Create an unbounded queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue holding at most `capacity` payloads
    pub fn bounded(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Number of queued payloads
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Pop the oldest payload
    pub fn receive(&self) -> Option<Bytes> {
        self.queue.lock().pop_front()
    }

    /// Remove and return everything queued, oldest first
    pub fn clear(&self) -> Vec<Bytes> {
        self.queue.lock().drain(..).collect()
    }
}

impl Publisher for QueueChannel {
    fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        let mut queue = self.queue.lock();
        if self.capacity.is_some_and(|cap| queue.len() >= cap) {
            return Err(PublishError::Full);
        }
        queue.push_back(payload);
        Ok(())
    }
}
