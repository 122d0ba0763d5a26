//! Per-connection handling: read frames, dispatch calls, write replies

use super::shutdown_requested;
use crate::channel::ChannelProcessor;
use crate::config::Protocol;
use crate::metrics::SourceMetrics;
use crate::thrift::{
    decode_call, encode_reply, encode_unknown_method, read_frame, write_frame, CodecError,
    Request,
};
use flume_bridge_core::{Event, Status};
use std::net::SocketAddr;
use std::sync::Arc;
use prometheus::IntGauge;
use tokio::net::TcpStream;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

/// Turns decoded calls into channel deliveries and status replies
pub(crate) struct Dispatcher {
    pub(crate) protocol: Protocol,
    pub(crate) max_frame_size: usize,
    pub(crate) processor: ChannelProcessor,
    pub(crate) metrics: SourceMetrics,
}

impl Dispatcher {
    /// Handle one call frame, returning the reply frame if one is due
    pub(crate) fn dispatch(&self, frame: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        let call = decode_call(self.protocol, frame)?;

        let reply = match call.request {
            Request::Append(event) => {
                let status = self.append(event);
                encode_reply(self.protocol, &call.name, call.seq, status)?
            }
            Request::AppendBatch(events) => {
                let status = self.append_batch(events);
                encode_reply(self.protocol, &call.name, call.seq, status)?
            }
            Request::Unknown => {
                warn!(method = %call.name, "Unknown method called");
                encode_unknown_method(self.protocol, &call.name, call.seq)?
            }
        };

        Ok((!call.oneway).then_some(reply))
    }

    fn append(&self, event: Event) -> Status {
        self.metrics.append_received.inc();
        self.metrics.events_received.inc();

        match self.processor.process_event(event) {
            Ok(()) => {
                self.metrics.append_accepted.inc();
                self.metrics.events_accepted.inc();
                Status::Ok
            }
            Err(e) => {
                warn!(error = %e, "Channel refused event");
                self.metrics.channel_write_fail.inc();
                Status::Failed
            }
        }
    }

    fn append_batch(&self, events: Vec<Event>) -> Status {
        let count = events.len() as u64;
        self.metrics.append_batch_received.inc();
        self.metrics.events_received.inc_by(count);

        match self.processor.process_event_list(events) {
            Ok(()) => {
                self.metrics.append_batch_accepted.inc();
                self.metrics.events_accepted.inc_by(count);
                Status::Ok
            }
            Err(e) => {
                warn!(error = %e, events = count, "Channel refused event batch");
                self.metrics.channel_write_fail.inc();
                Status::Failed
            }
        }
    }
}

/// Counts a connection in `connections_open` until dropped
struct OpenConnection<'a>(&'a IntGauge);

impl<'a> OpenConnection<'a> {
    fn track(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for OpenConnection<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Serve one client until it disconnects, misbehaves, or shutdown is signalled
pub(crate) async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    limiter: Option<Arc<Semaphore>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // Hold a slot for the lifetime of the connection when bounded
    let _permit = match limiter {
        Some(semaphore) => {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown_rx) => return,
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
            }
        }
        None => None,
    };

    let metrics = &dispatcher.metrics;
    let _open = OpenConnection::track(&metrics.connections_open);
    debug!(%peer, "Connection opened");

    loop {
        let frame = tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => break,
            frame = read_frame(&mut stream, dispatcher.max_frame_size) => frame,
        };

        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(CodecError::Io(e)) => {
                debug!(%peer, error = %e, "Connection read failed");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "Rejecting frame");
                metrics.malformed_frames.inc();
                break;
            }
        };

        let reply = match dispatcher.dispatch(&frame) {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(e) => {
                warn!(%peer, error = %e, "Malformed call");
                metrics.malformed_frames.inc();
                break;
            }
        };

        // A client that stops reading must not hold up shutdown
        let written = tokio::select! {
            _ = shutdown_requested(&mut shutdown_rx) => break,
            written = write_frame(&mut stream, &reply) => written,
        };
        if let Err(e) = written {
            debug!(%peer, error = %e, "Connection write failed");
            break;
        }
    }

    debug!(%peer, "Connection closed");
}
