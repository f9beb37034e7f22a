//! Length-prefixed framing over a byte stream.
//!
//! ```text
//! Frame    := uint32_be_length (4 bytes) || payload (length bytes)
//! Request  := Frame(command_text) Frame(encoded_image_bytes)
//! Response := Frame(encoded_image_bytes)
//! ```
//!
//! The prefix width and byte order are the protocol version contract:
//! client and server must agree on them, they are never negotiated.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::PixwireError;

/// Version of the framing contract documented above.
pub const PROTOCOL_VERSION: u32 = 1;

/// Width of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default ceiling for a single frame payload (64 MiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Encode a payload length as the 4-byte network-order prefix.
pub fn encode_length(len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE], PixwireError> {
    let len = u32::try_from(len).map_err(|_| PixwireError::LengthInvalid {
        size: len,
        max: u32::MAX as usize,
    })?;
    Ok(len.to_be_bytes())
}

/// Decode a 4-byte prefix and check it against `max_len`.
pub fn decode_length(
    prefix: [u8; LENGTH_PREFIX_SIZE],
    max_len: usize,
) -> Result<usize, PixwireError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_len {
        return Err(PixwireError::LengthInvalid {
            size: len,
            max: max_len,
        });
    }
    Ok(len)
}

/// Read one frame: a 4-byte length followed by exactly that many bytes.
///
/// Fails with [`PixwireError::ShortRead`] if the stream ends early and
/// [`PixwireError::LengthInvalid`] if the declared length is above
/// `max_len`. The payload buffer is only allocated after the length
/// has been validated.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, PixwireError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    read_full(reader, &mut prefix).await?;
    let len = decode_length(prefix, max_len)?;

    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload).await?;
    Ok(payload)
}

/// Write one frame and flush it.
///
/// `write_all` keeps retrying short writes until the whole frame is
/// on the wire; anything it cannot recover from is reported as
/// [`PixwireError::Write`].
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), PixwireError>
where
    W: AsyncWrite + Unpin,
{
    let prefix = encode_length(payload.len())?;
    writer.write_all(&prefix).await.map_err(PixwireError::Write)?;
    writer.write_all(payload).await.map_err(PixwireError::Write)?;
    writer.flush().await.map_err(PixwireError::Write)?;
    Ok(())
}

/// Fill `buf` completely, reporting how far we got if the peer hangs up.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), PixwireError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(PixwireError::ShortRead {
                expected: buf.len(),
                actual: filled,
            });
        }
        filled += n;
    }
    Ok(())
}
