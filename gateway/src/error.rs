//! Error types for the bridge

use crate::bridge::BridgeState;
use thiserror::Error;

pub use crate::channel::ChannelError;
pub use crate::thrift::CodecError;
pub use flume_bridge_core::PublishError;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Lifecycle operation called in the wrong state
    #[error("cannot {operation} bridge in state {state}")]
    IllegalState {
        operation: &'static str,
        state: BridgeState,
    },

    /// Listener could not acquire the configured address
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire codec error
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Channel delivery error
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(String),
}

impl BridgeError {
    /// Short stable label for logs and metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "config",
            BridgeError::IllegalState { .. } => "illegal_state",
            BridgeError::Bind { .. } => "bind",
            BridgeError::Io(_) => "io",
            BridgeError::Codec(_) => "codec",
            BridgeError::Channel(_) => "channel",
            BridgeError::Metrics(_) => "metrics",
        }
    }
}
