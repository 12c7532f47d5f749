//! Length-prefixed bincode framing.
//!
//! Every message on the wire is a 4-byte big-endian payload length followed
//! by the bincode encoding of the message.

use crate::error::NetError;
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame payload: 16 MB. Routing messages are tiny; `List` replies
/// are the largest thing that travels.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encodes `message` into a single frame.
pub fn encode<T: Serialize>(message: &T) -> Result<BytesMut, NetError> {
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(NetError::FrameTooLarge(payload.len()));
    }
    let mut frame = BytesMut::with_capacity(4 + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame)
}

/// Writes one frame and flushes.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, NetError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(NetError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}
