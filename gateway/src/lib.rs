//! flume-bridge - Flume Thrift RPC to channel bridge
//!
//! Accepts events from Flume RPC clients (Flume agents' Thrift sinks, the
//! Flume client SDK, or [`RpcClient`]) and republishes each event body to a
//! channel owned by the host application.
//!
//! ```text
//! Flume client ──► ThriftSource ──► ChannelProcessor ──► SinkAdapter ──► Publisher
//! ```
//!
//! The host supplies the [`Publisher`]; the bridge owns everything to its
//! left. Headers are accepted on the wire and dropped at the sink adapter.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod bridge;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod publish;
pub mod source;
pub mod thrift;

pub use bridge::{Bridge, BridgeState};
pub use channel::{Channel, ChannelProcessor, ChannelSelector, ReplicatingSelector, SinkAdapter};
pub use client::RpcClient;
pub use config::{BridgeConfig, Config, LogFormat, Protocol};
pub use error::{BridgeError, ChannelError, CodecError, Result};
pub use metrics::SourceMetrics;
pub use publish::{LoggingPublisher, QueueChannel};
pub use source::ThriftSource;

pub use flume_bridge_core::{publisher_fn, Event, Headers, PublishError, Publisher, Status};
