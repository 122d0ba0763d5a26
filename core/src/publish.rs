//! Publisher trait for the host channel
//!
//! The [`Publisher`] trait is the outbound side of the bridge: every event
//! body the listener receives is handed to exactly one `publish` call.

use crate::error::PublishError;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Publisher trait - hands a received payload to the host channel
///
/// The bridge calls `publish` synchronously on whichever task decoded the
/// event, possibly from several connections at once. Implementations must
/// therefore be `Send + Sync` and should not block for long.
///
/// # Implementation Requirements
///
/// - No queuing or retry is expected of the bridge; if the publisher needs
///   either, it provides them itself
/// - A returned error is reported to the sender as a failed delivery
/// - Payloads are passed through unchanged, including empty ones
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use flume_bridge_core::{Publisher, PublishError};
/// use std::sync::Mutex;
///
/// struct VecPublisher(Mutex<Vec<Bytes>>);
///
/// impl Publisher for VecPublisher {
///     fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
///         self.0
///             .lock()
///             .map_err(|e| PublishError::Rejected(e.to_string()))?
///             .push(payload);
///         Ok(())
///     }
/// }
///
/// let publisher = VecPublisher(Mutex::new(Vec::new()));
/// publisher.publish(Bytes::from_static(b"testing")).unwrap();
/// ```
pub trait Publisher: Send + Sync {
    /// Publish one payload to the host channel
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The payload was accepted
    /// * `Err(PublishError)` - The host channel refused it
    fn publish(&self, payload: Bytes) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        (**self).publish(payload)
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        (**self).publish(payload)
    }
}

/// Publisher backed by a closure
///
/// Created with [`publisher_fn`].
pub struct FnPublisher<F> {
    f: F,
}

impl<F> Publisher for FnPublisher<F>
where
    F: Fn(Bytes) -> Result<(), PublishError> + Send + Sync,
{
    fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        (self.f)(payload)
    }
}

/// Wrap a closure as a [`Publisher`]
///
/// ```
/// use bytes::Bytes;
/// use flume_bridge_core::{publisher_fn, Publisher};
///
/// let publisher = publisher_fn(|payload: Bytes| {
///     assert_eq!(payload.as_ref(), b"testing");
///     Ok(())
/// });
/// publisher.publish(Bytes::from_static(b"testing")).unwrap();
/// ```
pub fn publisher_fn<F>(f: F) -> FnPublisher<F>
where
    F: Fn(Bytes) -> Result<(), PublishError> + Send + Sync,
{
    FnPublisher { f }
}

/// Bounded tokio channel. `publish` is synchronous, so a full channel is
/// reported as [`PublishError::Full`] rather than awaited.
impl Publisher for mpsc::Sender<Bytes> {
    fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        self.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PublishError::Full,
            TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

impl Publisher for mpsc::UnboundedSender<Bytes> {
    fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        self.send(payload).map_err(|_| PublishError::Closed)
    }
}
