//! Outbound frame messages and their codec.
//!
//! ## Wire format
//!
//! One message per forwarded frame (little-endian):
//!
//! ```text
//! height:    u16  (2)
//! width:     u16  (2)
//! channels:  u16  (2)   always 3
//! data:      [u8] (height * width * channels, rows contiguous)
//! ```
//!
//! The header fixes the payload length, so messages are self-delimiting
//! on a stream transport; [`FrameCodec`] frames them over TCP via
//! `tokio_util::codec`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FarviewError;
use crate::video::frame::RgbImage;

/// Hard ceiling on a single message payload (covers 4K RGB with room
/// to spare; anything larger is a corrupt header).
pub const MAX_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;

// ── FrameMessage ─────────────────────────────────────────────────

/// One serialized frame on the outbound bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMessage {
    pub height: u16,
    pub width: u16,
    pub channels: u16,
    pub data: Vec<u8>,
}

impl FrameMessage {
    /// Encoded header size.
    pub const HEADER_SIZE: usize = 6;

    /// Channel count for RGB24 payloads.
    pub const RGB_CHANNELS: u16 = 3;

    /// Build a message from a converted RGB image.
    pub fn from_image(image: &RgbImage) -> Self {
        Self {
            height: image.height() as u16,
            width: image.width() as u16,
            channels: Self::RGB_CHANNELS,
            data: image.data().to_vec(),
        }
    }

    /// Payload length implied by the header.
    pub fn expected_payload(&self) -> usize {
        self.height as usize * self.width as usize * self.channels as usize
    }

    /// Total encoded size: header plus payload.
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + self.data.len()
    }
}

// ── FrameCodec ───────────────────────────────────────────────────

/// `tokio_util` codec for [`FrameMessage`]s.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Encoder<FrameMessage> for FrameCodec {
    type Error = FarviewError;

    fn encode(&mut self, item: FrameMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.data.len() != item.expected_payload() {
            return Err(FarviewError::InvalidHeader(
                "payload length does not match header",
            ));
        }
        if item.data.len() > MAX_PAYLOAD_SIZE {
            return Err(FarviewError::FrameTooLarge {
                size: item.data.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        dst.reserve(item.encoded_len());
        dst.put_u16_le(item.height);
        dst.put_u16_le(item.width);
        dst.put_u16_le(item.channels);
        dst.extend_from_slice(&item.data);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = FrameMessage;
    type Error = FarviewError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FrameMessage::HEADER_SIZE {
            return Ok(None);
        }

        let height = u16::from_le_bytes([src[0], src[1]]);
        let width = u16::from_le_bytes([src[2], src[3]]);
        let channels = u16::from_le_bytes([src[4], src[5]]);

        if channels != FrameMessage::RGB_CHANNELS {
            return Err(FarviewError::InvalidHeader("unexpected channel count"));
        }

        let payload = height as usize * width as usize * channels as usize;
        if payload > MAX_PAYLOAD_SIZE {
            return Err(FarviewError::FrameTooLarge {
                size: payload,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let total = FrameMessage::HEADER_SIZE + payload;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(FrameMessage::HEADER_SIZE);
        let data = src.split_to(payload).to_vec();

        Ok(Some(FrameMessage {
            height,
            width,
            channels,
            data,
        }))
    }
}

// ── Tests ────────────────────────────────────────────────────────
