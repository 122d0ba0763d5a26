//! Built-in publishers
//!
//! Host applications usually bring their own [`Publisher`]; these cover the
//! common cases:
//!
//! - [`QueueChannel`] - in-memory FIFO the host drains at its own pace
//! - [`LoggingPublisher`] - writes every payload to the `tracing` log
//! - `tokio::sync::mpsc::{Sender, UnboundedSender}<Bytes>` - hand-off to an
//!   async consumer task (implemented in `flume-bridge-core`)

mod logging;
mod queue;

pub use logging::LoggingPublisher;
pub use queue::QueueChannel;

pub use flume_bridge_core::{publisher_fn, Publisher};
