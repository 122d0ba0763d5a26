//! Encoding and decoding of `ThriftSourceProtocol` messages

use super::input::FrameInput;
use crate::config::Protocol;
use flume_bridge_core::{Event, Headers, Status};
use thrift::protocol::{
    TBinaryOutputProtocol, TCompactOutputProtocol, TFieldIdentifier, TInputProtocol,
    TListIdentifier, TMapIdentifier, TMessageIdentifier, TMessageType, TOutputProtocol,
    TStructIdentifier, TType,
};
use thrift::{ProtocolError, ProtocolErrorKind};
use thiserror::Error;

/// `Status append(1: ThriftFlumeEvent event)`
pub const METHOD_APPEND: &str = "append";

/// `Status appendBatch(1: list<ThriftFlumeEvent> events)`
pub const METHOD_APPEND_BATCH: &str = "appendBatch";

/// `TApplicationException` type for an unknown method
const UNKNOWN_METHOD: i32 = 1;

/// Error produced while framing, encoding or decoding
#[derive(Error, Debug)]
pub enum CodecError {
    /// Protocol-level decode/encode failure
    #[error("thrift error: {0}")]
    Thrift(#[from] thrift::Error),

    /// Frame exceeds the configured limit
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// Message type or method does not match what was expected
    #[error("unexpected message: {0}")]
    Unexpected(String),

    /// Peer answered with a `TApplicationException`
    #[error("remote exception: {0}")]
    Remote(String),

    /// Socket error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded service request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `append`
    Append(Event),
    /// `appendBatch`
    AppendBatch(Vec<Event>),
    /// Any other method name
    Unknown,
}

/// One decoded call message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Method name as sent
    pub name: String,
    /// Sequence id to echo in the reply
    pub seq: i32,
    /// Sent as `oneway`: no reply is expected
    pub oneway: bool,
    /// Decoded arguments
    pub request: Request,
}

/// One decoded reply message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// Sequence id of the call this answers
    pub seq: i32,
    /// Returned status
    pub status: Status,
}

fn output<'a>(protocol: Protocol, buf: &'a mut Vec<u8>) -> Box<dyn TOutputProtocol + 'a> {
    match protocol {
        Protocol::Compact => Box::new(TCompactOutputProtocol::new(buf)),
        Protocol::Binary => Box::new(TBinaryOutputProtocol::new(buf, true)),
    }
}

fn encode<F>(protocol: Protocol, write: F) -> Result<Vec<u8>, CodecError>
where
    F: FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
{
    let mut buf = Vec::new();
    {
        let mut o = output(protocol, &mut buf);
        write(o.as_mut())?;
        o.flush()?;
    }
    Ok(buf)
}

fn invalid_data(message: impl Into<String>) -> thrift::Error {
    thrift::Error::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidData, message))
}

// ─────────────────────────────────────────────────────────────────────────────
// ThriftFlumeEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Read a `ThriftFlumeEvent`; missing fields decode as empty
fn read_event(i: &mut dyn TInputProtocol) -> thrift::Result<Event> {
    i.read_struct_begin()?;
    let mut headers = Headers::new();
    let mut body = Vec::new();

    loop {
        let field = i.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(1), TType::Map) => {
                let map = i.read_map_begin()?;
                for _ in 0..map.size {
                    let key = i.read_string()?;
                    let value = i.read_string()?;
                    headers.insert(key, value);
                }
                i.read_map_end()?;
            }
            (Some(2), TType::String) => body = i.read_bytes()?,
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }

    i.read_struct_end()?;
    Ok(Event::from_parts(headers, body))
}

fn write_event(o: &mut dyn TOutputProtocol, event: &Event) -> thrift::Result<()> {
    o.write_struct_begin(&TStructIdentifier::new("ThriftFlumeEvent"))?;

    o.write_field_begin(&TFieldIdentifier::new("headers", TType::Map, 1))?;
    o.write_map_begin(&TMapIdentifier::new(
        TType::String,
        TType::String,
        event.headers().len() as i32,
    ))?;
    for (key, value) in event.headers() {
        o.write_string(key)?;
        o.write_string(value)?;
    }
    o.write_map_end()?;
    o.write_field_end()?;

    o.write_field_begin(&TFieldIdentifier::new("body", TType::String, 2))?;
    o.write_bytes(event.body())?;
    o.write_field_end()?;

    o.write_field_stop()?;
    o.write_struct_end()
}

// ─────────────────────────────────────────────────────────────────────────────
// Server side
// ─────────────────────────────────────────────────────────────────────────────

/// Decode a call frame received by the listener
pub fn decode_call(protocol: Protocol, frame: &[u8]) -> Result<Call, CodecError> {
    let mut i = FrameInput::new(protocol, frame);
    let ident = i.read_message_begin()?;

    let oneway = match ident.message_type {
        TMessageType::Call => false,
        TMessageType::OneWay => true,
        other => {
            return Err(CodecError::Unexpected(format!(
                "expected call, got {other:?} for '{}'",
                ident.name
            )))
        }
    };

    let request = match ident.name.as_str() {
        METHOD_APPEND => Request::Append(read_append_args(&mut i)?),
        METHOD_APPEND_BATCH => Request::AppendBatch(read_append_batch_args(&mut i)?),
        _ => {
            i.skip(TType::Struct)?;
            Request::Unknown
        }
    };
    i.read_message_end()?;

    Ok(Call {
        name: ident.name,
        seq: ident.sequence_number,
        oneway,
        request,
    })
}

fn read_append_args(i: &mut dyn TInputProtocol) -> thrift::Result<Event> {
    i.read_struct_begin()?;
    let mut event = None;

    loop {
        let field = i.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(1), TType::Struct) => event = Some(read_event(i)?),
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }

    i.read_struct_end()?;
    event.ok_or_else(|| invalid_data("append_args: missing field 'event'"))
}

fn read_append_batch_args(i: &mut dyn TInputProtocol) -> thrift::Result<Vec<Event>> {
    i.read_struct_begin()?;
    let mut events = None;

    loop {
        let field = i.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(1), TType::List) => {
                let list = i.read_list_begin()?;
                if list.element_type != TType::Struct && list.size > 0 {
                    return Err(invalid_data(format!(
                        "appendBatch_args: expected list<struct>, got list<{:?}>",
                        list.element_type
                    )));
                }
                let mut batch = Vec::new();
                for _ in 0..list.size {
                    batch.push(read_event(i)?);
                }
                i.read_list_end()?;
                events = Some(batch);
            }
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }

    i.read_struct_end()?;
    events.ok_or_else(|| invalid_data("appendBatch_args: missing field 'events'"))
}

/// Encode the `Status` reply to a call
pub fn encode_reply(
    protocol: Protocol,
    method: &str,
    seq: i32,
    status: Status,
) -> Result<Vec<u8>, CodecError> {
    encode(protocol, |o| {
        o.write_message_begin(&TMessageIdentifier::new(method, TMessageType::Reply, seq))?;
        o.write_struct_begin(&TStructIdentifier::new(format!("{method}_result")))?;
        o.write_field_begin(&TFieldIdentifier::new("success", TType::I32, 0))?;
        o.write_i32(status.as_i32())?;
        o.write_field_end()?;
        o.write_field_stop()?;
        o.write_struct_end()?;
        o.write_message_end()
    })
}

/// Encode a `TApplicationException` for a method the service does not have
pub fn encode_unknown_method(
    protocol: Protocol,
    method: &str,
    seq: i32,
) -> Result<Vec<u8>, CodecError> {
    encode(protocol, |o| {
        o.write_message_begin(&TMessageIdentifier::new(
            method,
            TMessageType::Exception,
            seq,
        ))?;
        o.write_struct_begin(&TStructIdentifier::new("TApplicationException"))?;
        o.write_field_begin(&TFieldIdentifier::new("message", TType::String, 1))?;
        o.write_string(&format!("Invalid method name: '{method}'"))?;
        o.write_field_end()?;
        o.write_field_begin(&TFieldIdentifier::new("type", TType::I32, 2))?;
        o.write_i32(UNKNOWN_METHOD)?;
        o.write_field_end()?;
        o.write_field_stop()?;
        o.write_struct_end()?;
        o.write_message_end()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Client side
// ─────────────────────────────────────────────────────────────────────────────

/// Encode an `append` call
pub fn encode_append(protocol: Protocol, seq: i32, event: &Event) -> Result<Vec<u8>, CodecError> {
    encode(protocol, |o| {
        o.write_message_begin(&TMessageIdentifier::new(
            METHOD_APPEND,
            TMessageType::Call,
            seq,
        ))?;
        o.write_struct_begin(&TStructIdentifier::new("append_args"))?;
        o.write_field_begin(&TFieldIdentifier::new("event", TType::Struct, 1))?;
        write_event(o, event)?;
        o.write_field_end()?;
        o.write_field_stop()?;
        o.write_struct_end()?;
        o.write_message_end()
    })
}

/// Encode an `appendBatch` call
pub fn encode_append_batch(
    protocol: Protocol,
    seq: i32,
    events: &[Event],
) -> Result<Vec<u8>, CodecError> {
    encode(protocol, |o| {
        o.write_message_begin(&TMessageIdentifier::new(
            METHOD_APPEND_BATCH,
            TMessageType::Call,
            seq,
        ))?;
        o.write_struct_begin(&TStructIdentifier::new("appendBatch_args"))?;
        o.write_field_begin(&TFieldIdentifier::new("events", TType::List, 1))?;
        o.write_list_begin(&TListIdentifier::new(TType::Struct, events.len() as i32))?;
        for event in events {
            write_event(o, event)?;
        }
        o.write_list_end()?;
        o.write_field_end()?;
        o.write_field_stop()?;
        o.write_struct_end()?;
        o.write_message_end()
    })
}

/// Decode the reply to `append` / `appendBatch`
///
/// A `TApplicationException` reply becomes [`CodecError::Remote`].
pub fn decode_reply(protocol: Protocol, frame: &[u8]) -> Result<Reply, CodecError> {
    let mut i = FrameInput::new(protocol, frame);
    let ident = i.read_message_begin()?;

    match ident.message_type {
        TMessageType::Reply => {}
        TMessageType::Exception => {
            let message = read_application_exception(&mut i)?;
            i.read_message_end()?;
            return Err(CodecError::Remote(message));
        }
        other => {
            return Err(CodecError::Unexpected(format!(
                "expected reply, got {other:?} for '{}'",
                ident.name
            )))
        }
    }

    i.read_struct_begin()?;
    let mut status = None;
    loop {
        let field = i.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(0), TType::I32) => status = Some(Status::from_i32(i.read_i32()?)),
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }
    i.read_struct_end()?;
    i.read_message_end()?;

    let status = status.ok_or_else(|| {
        CodecError::Unexpected(format!("reply to '{}' has no result", ident.name))
    })?;
    Ok(Reply {
        seq: ident.sequence_number,
        status,
    })
}

fn read_application_exception(i: &mut dyn TInputProtocol) -> thrift::Result<String> {
    i.read_struct_begin()?;
    let mut message = String::new();
    let mut kind = 0;

    loop {
        let field = i.read_field_begin()?;
        if field.field_type == TType::Stop {
            break;
        }
        match (field.id, field.field_type) {
            (Some(1), TType::String) => message = i.read_string()?,
            (Some(2), TType::I32) => kind = i.read_i32()?,
            (_, field_type) => i.skip(field_type)?,
        }
        i.read_field_end()?;
    }

    i.read_struct_end()?;
    Ok(format!("{message} (type {kind})"))
}
