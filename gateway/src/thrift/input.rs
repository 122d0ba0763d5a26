//! Bounded protocol input over one received frame
//!
//! The `thrift` protocol readers size their buffers from the length the
//! peer declares, before checking that many bytes exist. [`FrameInput`]
//! reads every length-prefixed value (message names, strings, binaries)
//! itself and rejects lengths that are negative or run past the end of the
//! frame. Container sizes are held to the same bound. Everything else is
//! delegated to the regular compact or binary reader over the same bytes.

use crate::config::Protocol;
use std::cell::Cell;
use std::io::Read;
use std::rc::Rc;
use thrift::protocol::{
    TBinaryInputProtocol, TCompactInputProtocol, TFieldIdentifier, TInputProtocol,
    TListIdentifier, TMapIdentifier, TMessageIdentifier, TMessageType, TSetIdentifier,
    TStructIdentifier,
};
use thrift::{ProtocolError, ProtocolErrorKind};

const BINARY_VERSION_MASK: u32 = 0xffff_0000;
const BINARY_VERSION_1: u32 = 0x8001_0000;
const COMPACT_PROTOCOL_ID: u8 = 0x82;
const COMPACT_VERSION: u8 = 0x01;
const COMPACT_VERSION_MASK: u8 = 0x1f;

fn protocol_error(kind: ProtocolErrorKind, message: impl Into<String>) -> thrift::Error {
    thrift::Error::Protocol(ProtocolError::new(kind, message))
}

fn eof() -> thrift::Error {
    thrift::Error::Transport(thrift::TransportError::new(
        thrift::TransportErrorKind::EndOfFile,
        "frame ended early",
    ))
}

/// Unread part of a frame, shared between [`FrameInput`] and its reader
#[derive(Clone)]
struct Cursor<'a>(Rc<Cell<&'a [u8]>>);

impl<'a> Cursor<'a> {
    fn new(frame: &'a [u8]) -> Self {
        Self(Rc::new(Cell::new(frame)))
    }

    fn remaining(&self) -> usize {
        self.0.get().len()
    }

    fn take(&self, n: usize) -> thrift::Result<&'a [u8]> {
        let rest = self.0.get();
        if n > rest.len() {
            return Err(eof());
        }
        let (head, tail) = rest.split_at(n);
        self.0.set(tail);
        Ok(head)
    }

    fn read_u8(&self) -> thrift::Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_i32_be(&self) -> thrift::Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_varint_u32(&self) -> thrift::Result<u32> {
        let mut value: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            let bits = u32::from(byte & 0x7f);
            if shift == 28 && bits > 0x0f {
                break;
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(protocol_error(
            ProtocolErrorKind::InvalidData,
            "varint does not fit in 32 bits",
        ))
    }
}

impl Read for Cursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut rest = self.0.get();
        let n = rest.read(buf)?;
        self.0.set(rest);
        Ok(n)
    }
}

/// `TInputProtocol` over a single frame with length checks
pub(crate) struct FrameInput<'a> {
    protocol: Protocol,
    cursor: Cursor<'a>,
    inner: Box<dyn TInputProtocol + 'a>,
}

impl<'a> FrameInput<'a> {
    pub(crate) fn new(protocol: Protocol, frame: &'a [u8]) -> Self {
        let cursor = Cursor::new(frame);
        let inner: Box<dyn TInputProtocol + 'a> = match protocol {
            Protocol::Compact => Box::new(TCompactInputProtocol::new(cursor.clone())),
            // lenient read: accept unversioned messages from older senders
            Protocol::Binary => Box::new(TBinaryInputProtocol::new(cursor.clone(), false)),
        };
        Self {
            protocol,
            cursor,
            inner,
        }
    }

    fn read_length(&self) -> thrift::Result<usize> {
        let len = match self.protocol {
            Protocol::Binary => {
                let len = self.cursor.read_i32_be()?;
                usize::try_from(len).map_err(|_| {
                    protocol_error(
                        ProtocolErrorKind::NegativeSize,
                        format!("negative length {len}"),
                    )
                })?
            }
            Protocol::Compact => self.cursor.read_varint_u32()? as usize,
        };
        self.check_fits(len)?;
        Ok(len)
    }

    fn check_fits(&self, len: usize) -> thrift::Result<()> {
        let remaining = self.cursor.remaining();
        if len > remaining {
            return Err(protocol_error(
                ProtocolErrorKind::SizeLimit,
                format!("declared length {len} exceeds the {remaining} bytes left in the frame"),
            ));
        }
        Ok(())
    }

    fn check_count(&self, size: i32) -> thrift::Result<()> {
        let count = usize::try_from(size).map_err(|_| {
            protocol_error(
                ProtocolErrorKind::NegativeSize,
                format!("negative container size {size}"),
            )
        })?;
        self.check_fits(count)
    }

    fn string_of_len(&self, len: usize) -> thrift::Result<String> {
        self.check_fits(len)?;
        let bytes = Cursor::take(&self.cursor, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            protocol_error(ProtocolErrorKind::InvalidData, format!("invalid UTF-8: {e}"))
        })
    }

    fn read_binary_message_begin(&mut self) -> thrift::Result<TMessageIdentifier> {
        let first = self.cursor.read_i32_be()?;
        if first < 0 {
            let version = first as u32 & BINARY_VERSION_MASK;
            if version != BINARY_VERSION_1 {
                return Err(protocol_error(
                    ProtocolErrorKind::BadVersion,
                    format!("unsupported binary version {version:#x}"),
                ));
            }
            let message_type = TMessageType::try_from((first & 0xff) as u8)?;
            let name = self.read_string()?;
            let seq = self.cursor.read_i32_be()?;
            Ok(TMessageIdentifier::new(name, message_type, seq))
        } else {
            let name = self.string_of_len(first as usize)?;
            let message_type = TMessageType::try_from(self.cursor.read_u8()?)?;
            let seq = self.cursor.read_i32_be()?;
            Ok(TMessageIdentifier::new(name, message_type, seq))
        }
    }

    fn read_compact_message_begin(&mut self) -> thrift::Result<TMessageIdentifier> {
        let protocol_id = self.cursor.read_u8()?;
        if protocol_id != COMPACT_PROTOCOL_ID {
            return Err(protocol_error(
                ProtocolErrorKind::BadVersion,
                format!("unexpected compact protocol id {protocol_id:#x}"),
            ));
        }
        let header = self.cursor.read_u8()?;
        let version = header & COMPACT_VERSION_MASK;
        if version != COMPACT_VERSION {
            return Err(protocol_error(
                ProtocolErrorKind::BadVersion,
                format!("unsupported compact version {version}"),
            ));
        }
        let message_type = TMessageType::try_from(header >> 5)?;
        let seq = self.cursor.read_varint_u32()? as i32;
        let name = self.read_string()?;
        Ok(TMessageIdentifier::new(name, message_type, seq))
    }
}

impl TInputProtocol for FrameInput<'_> {
    fn read_message_begin(&mut self) -> thrift::Result<TMessageIdentifier> {
        match self.protocol {
            Protocol::Binary => self.read_binary_message_begin(),
            Protocol::Compact => self.read_compact_message_begin(),
        }
    }

    fn read_message_end(&mut self) -> thrift::Result<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> thrift::Result<Option<TStructIdentifier>> {
        self.inner.read_struct_begin()
    }

    fn read_struct_end(&mut self) -> thrift::Result<()> {
        self.inner.read_struct_end()
    }

    fn read_field_begin(&mut self) -> thrift::Result<TFieldIdentifier> {
        self.inner.read_field_begin()
    }

    fn read_field_end(&mut self) -> thrift::Result<()> {
        self.inner.read_field_end()
    }

    fn read_bool(&mut self) -> thrift::Result<bool> {
        self.inner.read_bool()
    }

    fn read_bytes(&mut self) -> thrift::Result<Vec<u8>> {
        let len = self.read_length()?;
        Ok(Cursor::take(&self.cursor, len)?.to_vec())
    }

    fn read_i8(&mut self) -> thrift::Result<i8> {
        self.inner.read_i8()
    }

    fn read_i16(&mut self) -> thrift::Result<i16> {
        self.inner.read_i16()
    }

    fn read_i32(&mut self) -> thrift::Result<i32> {
        self.inner.read_i32()
    }

    fn read_i64(&mut self) -> thrift::Result<i64> {
        self.inner.read_i64()
    }

    fn read_double(&mut self) -> thrift::Result<f64> {
        self.inner.read_double()
    }

    fn read_string(&mut self) -> thrift::Result<String> {
        let len = self.read_length()?;
        self.string_of_len(len)
    }

    fn read_list_begin(&mut self) -> thrift::Result<TListIdentifier> {
        let list = self.inner.read_list_begin()?;
        self.check_count(list.size)?;
        Ok(list)
    }

    fn read_list_end(&mut self) -> thrift::Result<()> {
        self.inner.read_list_end()
    }

    fn read_set_begin(&mut self) -> thrift::Result<TSetIdentifier> {
        let set = self.inner.read_set_begin()?;
        self.check_count(set.size)?;
        Ok(set)
    }

    fn read_set_end(&mut self) -> thrift::Result<()> {
        self.inner.read_set_end()
    }

    fn read_map_begin(&mut self) -> thrift::Result<TMapIdentifier> {
        let map = self.inner.read_map_begin()?;
        self.check_count(map.size)?;
        Ok(map)
    }

    fn read_map_end(&mut self) -> thrift::Result<()> {
        self.inner.read_map_end()
    }

    fn read_byte(&mut self) -> thrift::Result<u8> {
        self.inner.read_byte()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_binary_name_length_rejected() {
        let frame = [0x80, 0x01, 0x00, 0x01, 0xff, 0xff, 0xff, 0xff];
        let mut input = FrameInput::new(Protocol::Binary, &frame);
        assert!(input.read_message_begin().is_err());
    }

    #[test]
    fn test_unversioned_name_longer_than_frame_rejected() {
        let frame = [0x7f, 0xff, 0xff, 0xff, b'a'];
        let mut input = FrameInput::new(Protocol::Binary, &frame);
        assert!(input.read_message_begin().is_err());
    }

    #[test]
    fn test_compact_name_longer_than_frame_rejected() {
        // protocol id, call v1, seq 1, name length varint 0xffffffff
        let frame = [0x82, 0x21, 0x01, 0xff, 0xff, 0xff, 0xff, 0x0f];
        let mut input = FrameInput::new(Protocol::Compact, &frame);
        assert!(input.read_message_begin().is_err());
    }

    #[test]
    fn test_oversized_bytes_rejected() {
        let mut frame = 1_000_000i32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"short");
        let mut input = FrameInput::new(Protocol::Binary, &frame);
        assert!(input.read_bytes().is_err());

        let frame = (-5i32).to_be_bytes();
        let mut input = FrameInput::new(Protocol::Binary, &frame);
        assert!(input.read_bytes().is_err());
    }

    #[test]
    fn test_bytes_within_frame_read() {
        let mut frame = 3i32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"abc");
        let mut input = FrameInput::new(Protocol::Binary, &frame);
        assert_eq!(input.read_bytes().unwrap(), b"abc");

        let mut input = FrameInput::new(Protocol::Compact, &[0x02, b'h', b'i']);
        assert_eq!(input.read_string().unwrap(), "hi");
    }

    #[test]
    fn test_varint_overflow_rejected() {
        let cursor = Cursor::new(&[0xff, 0xff, 0xff, 0xff, 0x7f]);
        assert!(cursor.read_varint_u32().is_err());

        let cursor = Cursor::new(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(cursor.read_varint_u32().unwrap(), u32::MAX);
    }
}
