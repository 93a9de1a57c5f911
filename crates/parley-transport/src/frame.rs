//! Length-prefixed frame codec.
//!
//! TCP is a byte stream with no message boundaries, so every logical
//! message travels as a frame:
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (LE)  | payload: `len` bytes      |
//! +----------------+---------------------------+
//! ```
//!
//! `len` counts the payload only. Zero-length frames are consumed and
//! skipped. A prefix above the configured limit is a framing error that
//! ends the stream, since the next boundary can no longer be located.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::TransportError;

/// Size of the length prefix in bytes.
pub const PREFIX_LEN: usize = 4;

/// Default upper bound on a single frame's payload (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// A tokio codec that frames payloads with a 4-byte little-endian length.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    /// Creates a codec with the default frame limit.
    pub fn new() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Creates a codec that rejects payloads longer than `max_frame_len`.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    /// Returns the configured frame limit.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, TransportError> {
        loop {
            if src.len() < PREFIX_LEN {
                src.reserve(PREFIX_LEN - src.len());
                return Ok(None);
            }

            let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;

            if len == 0 {
                src.advance(PREFIX_LEN);
                tracing::trace!("skipping zero-length frame");
                continue;
            }

            if len > self.max_frame_len {
                return Err(TransportError::FrameTooLarge {
                    len,
                    max: self.max_frame_len,
                });
            }

            let total = PREFIX_LEN + len;
            if src.len() < total {
                // Wait for the rest of the payload.
                src.reserve(total - src.len());
                return Ok(None);
            }

            src.advance(PREFIX_LEN);
            return Ok(Some(src.split_to(len).freeze()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, TransportError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            // Peer closed mid-frame: end of stream, not an error.
            tracing::debug!(remaining = src.len(), "discarding truncated frame at eof");
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), TransportError> {
        Encoder::<&[u8]>::encode(self, &item[..], dst)
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), TransportError> {
        if item.len() > self.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len: item.len(),
                max: self.max_frame_len,
            });
        }
        dst.reserve(PREFIX_LEN + item.len());
        dst.put_u32_le(item.len() as u32);
        dst.put_slice(item);
        Ok(())
    }
}
