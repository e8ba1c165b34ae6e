//! Length-prefixed framing: a 2-byte big-endian length, then exactly that
//! many payload bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 2;

/// Largest payload a frame can carry.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Builds a complete frame (prefix + payload) in one buffer.
///
/// # Errors
/// Returns [`TransportError::FrameTooLarge`] for payloads over
/// [`MAX_FRAME_LEN`].
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let len = u16::try_from(payload.len())
        .map_err(|_| TransportError::FrameTooLarge(payload.len()))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Writes one frame and flushes.
///
/// # Errors
/// [`TransportError::FrameTooLarge`] before anything is written, or
/// [`TransportError::SendFailed`] if the writer fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer
        .write_all(&frame)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}

/// Reads exactly one frame.
///
/// `read_exact` keeps reading until the buffer is filled, so partial
/// reads from the socket are stitched together.
///
/// # Errors
/// - [`TransportError::ConnectionClosed`] when the stream ends cleanly
///   between frames
/// - [`TransportError::ReceiveFailed`] for I/O errors and for a stream
///   that ends inside a frame
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let first = reader
        .read(&mut header)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    if first == 0 {
        return Err(TransportError::ConnectionClosed("end of stream".into()));
    }
    reader
        .read_exact(&mut header[first..])
        .await
        .map_err(TransportError::ReceiveFailed)?;

    let len = u16::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    Ok(payload)
}
