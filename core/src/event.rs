//! Event type for the bridge
//!
//! An [`Event`] is what the listener decodes from one `ThriftFlumeEvent` on
//! the wire. The body is held as [`Bytes`] so handing it to a publisher is a
//! refcount bump, not a copy:
//!
//! ```text
//! Frame bytes ──► Event { headers, body } ──► publish(body)
//!                           │
//!                           └── headers are dropped at the sink adapter
//! ```

use bytes::Bytes;
use std::collections::HashMap;

/// Event headers as sent by the Flume agent
pub type Headers = HashMap<String, String>;

/// One unit of delivered data
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use flume_bridge_core::Event;
///
/// let event = Event::new(Bytes::from_static(b"testing"))
///     .with_header("host", "web-1");
/// assert_eq!(event.body().as_ref(), b"testing");
/// assert_eq!(event.headers().get("host").map(String::as_str), Some("web-1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    headers: Headers,
    body: Bytes,
}

impl Event {
    /// Create an event with the given body and no headers
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Create an event from decoded headers and body
    pub fn from_parts(headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Add a header (builder style)
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Event headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Event body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the event, keeping only the body
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Split into headers and body
    pub fn into_parts(self) -> (Headers, Bytes) {
        (self.headers, self.body)
    }
}
