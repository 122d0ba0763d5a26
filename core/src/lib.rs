//! flume-bridge-core - Core types for the Flume Thrift bridge
//!
//! This crate provides the types shared between the bridge listener and
//! the host application that consumes forwarded payloads:
//!
//! - [`Event`] - one delivered unit of data (headers + opaque body)
//! - [`Status`] - the Flume RPC status returned to senders
//! - [`Publisher`] trait - the host-side hand-off point for payloads
//! - [`PublishError`] - error type for publisher implementations
//!
//! # Why this crate exists
//!
//! Host applications implement [`Publisher`] to receive payloads. Keeping the
//! trait here means a host crate can provide publishers without pulling in
//! the listener and its Thrift/tokio stack:
//!
//! ```text
//! flume-bridge-core ◄── flume-bridge (listener, bridge)
//!     ▲
//!     └────────────── host crate (Publisher impls)
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod error;
/// The delivered event envelope
pub mod event;
mod publish;
/// Flume RPC status codes
pub mod status;

pub use error::PublishError;
pub use event::{Event, Headers};
pub use publish::{publisher_fn, FnPublisher, Publisher};
pub use status::Status;
