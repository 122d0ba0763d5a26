//! Convenience re-exports for host applications.
//!
//! ```rust
//! use flume_bridge_runtime::prelude::*;
//! ```

// Core types
pub use flume_bridge_core::{publisher_fn, Event, PublishError, Publisher, Status};

// Bridge
pub use flume_bridge::{Bridge, BridgeConfig, BridgeError, BridgeState, Protocol};

// Built-in publishers
pub use flume_bridge::{LoggingPublisher, QueueChannel};

// Client
pub use flume_bridge::RpcClient;

// Zero-copy payload
pub use bytes::Bytes;

// Runtime
pub use crate::RuntimeBuilder;
