//! `tokio_util` codec for the length-prefixed frame format.
//!
//! Mirrors [`crate::frame::read_frame`] / [`crate::frame::write_frame`]
//! for callers that drive a `Framed` transport instead of raw streams.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::PixwireError;
use crate::frame::{self, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};

/// Inbound and outbound frames have separate ceilings.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    max_encode_size: usize,
}

impl FrameCodec {
    /// Same ceiling in both directions.
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            max_encode_size: max_frame_size,
        }
    }

    /// Override the ceiling for outgoing frames.
    pub fn with_max_encode_size(mut self, max_encode_size: usize) -> Self {
        self.max_encode_size = max_encode_size;
        self
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn max_encode_size(&self) -> usize {
        self.max_encode_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = PixwireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
        let len = frame::decode_length(prefix, self.max_frame_size)?;

        if src.len() < LENGTH_PREFIX_SIZE + len {
            src.reserve(LENGTH_PREFIX_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => {
                let expected = if buf.len() < LENGTH_PREFIX_SIZE {
                    LENGTH_PREFIX_SIZE
                } else {
                    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
                    prefix.copy_from_slice(&buf[..LENGTH_PREFIX_SIZE]);
                    LENGTH_PREFIX_SIZE + u32::from_be_bytes(prefix) as usize
                };
                Err(PixwireError::ShortRead {
                    expected,
                    actual: buf.len(),
                })
            }
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = PixwireError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_encode_size {
            return Err(PixwireError::LengthInvalid {
                size: item.len(),
                max: self.max_encode_size,
            });
        }
        let prefix = frame::encode_length(item.len())?;
        dst.reserve(LENGTH_PREFIX_SIZE + item.len());
        dst.put_slice(&prefix);
        dst.put_slice(&item);
        Ok(())
    }
}
