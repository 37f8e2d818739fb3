use bytes::BytesMut;
use tokio_util::codec::Decoder;

use super::{Frame, DEFAULT_MAX_FRAME_LEN, LEN_FIELD_SIZE};
use crate::error::FrameError;

/// Tokio codec for decoding length-prefixed inbound frames.
///
/// The 4-byte little-endian length field counts itself, and the produced
/// frame payload keeps it in place, so the decoder never splits the length
/// off from the rest of the frame.
#[derive(Debug)]
pub struct FrameCodec {
    /// Configured maximum total frame length (enforced on decode).
    max_frame_len: u32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Create a codec with a custom maximum frame length.
    pub fn with_max_frame_len(max_frame_len: u32) -> Self {
        Self { max_frame_len }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_FIELD_SIZE {
            return Ok(None);
        }

        let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if len < LEN_FIELD_SIZE as u32 {
            return Err(FrameError::LengthTooSmall(len));
        }
        if len > self.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: self.max_frame_len,
            });
        }

        // Wait for the full frame.
        let total = len as usize;
        if src.len() < total {
            // Reserve space so the next read has room.
            src.reserve(total - src.len());
            return Ok(None);
        }

        let payload = src.split_to(total).freeze();

        Ok(Some(Frame { len, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_frame(body: &[u8]) -> Vec<u8> {
        let len = (LEN_FIELD_SIZE + body.len()) as u32;
        let mut out = len.to_le_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn decode_complete_frame() {
        let mut codec = FrameCodec::new();
        let wire = encode_frame(b"hello world");

        let mut buf = BytesMut::from(&wire[..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(frame.len, wire.len() as u32);
        assert_eq!(&frame.payload[..], &wire[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_partial_length_field() {
        let mut codec = FrameCodec::new();
        let wire = encode_frame(b"test");

        // Only two bytes of the length field.
        let mut buf = BytesMut::from(&wire[..2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&wire[2..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame.payload[..], &wire[..]);
    }

    #[test]
    fn decode_waits_for_partial_body() {
        let mut codec = FrameCodec::new();
        let wire = encode_frame(&[0xAB; 100]);

        let mut buf = BytesMut::from(&wire[..50]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&wire[50..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.len(), wire.len());
    }

    #[test]
    fn decode_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut wire = encode_frame(b"first");
        wire.extend_from_slice(&encode_frame(b"second"));

        let mut buf = BytesMut::from(&wire[..]);
        let a = codec.decode(&mut buf).unwrap().unwrap();
        let b = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(&a.payload[LEN_FIELD_SIZE..], b"first");
        assert_eq!(&b.payload[LEN_FIELD_SIZE..], b"second");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn length_below_field_size_is_rejected() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&3u32.to_le_bytes()[..]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::LengthTooSmall(3)));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut codec = FrameCodec::with_max_frame_len(1024);
        let mut buf = BytesMut::from(&4096u32.to_le_bytes()[..]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::FrameTooLarge { size: 4096, max: 1024 }
        ));
    }
}
