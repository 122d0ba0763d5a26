//! Thrift RPC client
//!
//! Speaks the same `ThriftSourceProtocol` as the listener, so it can drive a
//! bridge (or a real Flume Thrift source) from Rust. One call is in flight
//! at a time per client.

use crate::config::{Protocol, DEFAULT_MAX_FRAME_SIZE};
use crate::error::{BridgeError, Result};
use crate::thrift::{
    decode_reply, encode_append, encode_append_batch, read_frame, write_frame, CodecError,
};
use flume_bridge_core::{Event, Status};
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// Default time to wait for a reply
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Client connection to a Thrift source
#[derive(Debug)]
pub struct RpcClient {
    stream: TcpStream,
    protocol: Protocol,
    seq: i32,
    request_timeout: Duration,
}

impl RpcClient {
    /// Connect to a listener using `protocol`
    pub async fn connect(addr: impl ToSocketAddrs, protocol: Protocol) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(peer = ?stream.peer_addr().ok(), %protocol, "Connected to Thrift source");

        Ok(Self {
            stream,
            protocol,
            seq: 0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Override the reply timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Send one event
    pub async fn append(&mut self, event: &Event) -> Result<Status> {
        let seq = self.next_seq();
        let frame = encode_append(self.protocol, seq, event)?;
        self.call(seq, &frame).await
    }

    /// Send events as one batch
    pub async fn append_batch(&mut self, events: &[Event]) -> Result<Status> {
        let seq = self.next_seq();
        let frame = encode_append_batch(self.protocol, seq, events)?;
        self.call(seq, &frame).await
    }

    async fn call(&mut self, seq: i32, frame: &[u8]) -> Result<Status> {
        let stream = &mut self.stream;
        let exchange = async move {
            write_frame(stream, frame).await?;
            let reply = read_frame(stream, DEFAULT_MAX_FRAME_SIZE).await?;
            reply.ok_or_else(|| {
                CodecError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before reply",
                ))
            })
        };

        let reply = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| {
                BridgeError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timed out waiting for reply",
                ))
            })??;

        let reply = decode_reply(self.protocol, &reply)?;
        if reply.seq != seq {
            return Err(CodecError::Unexpected(format!(
                "reply sequence {} does not match call {seq}",
                reply.seq
            ))
            .into());
        }
        Ok(reply.status)
    }

    fn next_seq(&mut self) -> i32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }
}
