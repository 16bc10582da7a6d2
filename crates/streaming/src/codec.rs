//! Length-prefixed bincode framing.
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (BE)  | bincode(Message), len B   |
//! +----------------+---------------------------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, StreamingError};
use crate::protocol::Message;

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Largest accepted frame body.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encodes `message` into a complete frame.
pub fn encode(message: &Message) -> Result<Bytes> {
    let body = bincode::serialize(message)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(StreamingError::FrameTooLarge(body.len()));
    }
    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    frame.put_u32(body.len() as u32);
    frame.extend_from_slice(&body);
    Ok(frame.freeze())
}

/// Decodes one frame from the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched while the frame is still
/// incomplete.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Message>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(StreamingError::FrameTooLarge(len));
    }
    if buf.len() < HEADER_LEN + len {
        return Ok(None);
    }
    buf.advance(HEADER_LEN);
    let body = buf.split_to(len);
    Ok(Some(bincode::deserialize(&body)?))
}

/// Reads one frame. `Ok(None)` on a clean end of stream.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(StreamingError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(bincode::deserialize(&body)?))
}

pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
