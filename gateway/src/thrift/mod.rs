//! Flume `ThriftSourceProtocol` wire format
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────┐
//! │ length (u32) │ Thrift message (compact or binary)       │
//! │ big-endian   │ append(ThriftFlumeEvent) / appendBatch() │
//! └──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! The IDL this module speaks:
//!
//! ```text
//! struct ThriftFlumeEvent {
//!   1: required map<string, string> headers,
//!   2: required binary body,
//! }
//!
//! enum Status { OK, FAILED, ERROR, UNKNOWN }
//!
//! service ThriftSourceProtocol {
//!   Status append(1: ThriftFlumeEvent event),
//!   Status appendBatch(1: list<ThriftFlumeEvent> events),
//! }
//! ```
//!
//! Protocol encoding is delegated to the `thrift` crate; this module only
//! knows the service shape. Decoding goes through a bounded reader so a
//! declared length can never exceed the frame it arrived in.

mod codec;
mod frame;
mod input;

pub use codec::{
    decode_call, decode_reply, encode_append, encode_append_batch, encode_reply,
    encode_unknown_method, Call, CodecError, Reply, Request, METHOD_APPEND, METHOD_APPEND_BATCH,
};
pub use frame::{read_frame, write_frame};
