//! Error types for publishers

use thiserror::Error;

/// Error type for [`Publisher`](crate::Publisher) operations
///
/// Publishers are supplied by the host application, so the bridge treats
/// these errors as opaque: they are reported back to the sender as a
/// failed delivery and never retried.
///
/// # Example
///
/// ```
/// use flume_bridge_core::PublishError;
///
/// fn forward(closed: bool) -> Result<(), PublishError> {
///     if closed {
///         return Err(PublishError::Closed);
///     }
///     Ok(())
/// }
///
/// assert!(matches!(forward(true), Err(PublishError::Closed)));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The downstream channel has been closed
    ///
    /// Returned when every receiver of the host channel is gone.
    #[error("channel closed")]
    Closed,

    /// The downstream channel is at capacity
    ///
    /// Returned by bounded channels that would otherwise block.
    #[error("channel full")]
    Full,

    /// The publisher refused the payload
    ///
    /// Catch-all for host-specific failures.
    #[error("publish rejected: {0}")]
    Rejected(String),
}
