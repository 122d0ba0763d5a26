//! Framed transport: 4-byte big-endian length, then the message

use super::CodecError;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read one frame
///
/// Returns `Ok(None)` when the peer closed the connection between frames.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Vec<u8>>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > max_frame_size {
        return Err(CodecError::FrameTooLarge {
            size: len,
            limit: max_frame_size,
        });
    }

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(Some(frame))
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, message: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(message.len()).map_err(|_| CodecError::FrameTooLarge {
        size: message.len(),
        limit: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(4 + message.len());
    buf.put_u32(len);
    buf.put_slice(message);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
