pub mod codec;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;

use crate::error::FrameError;

use self::codec::FrameCodec;

/// Size of the little-endian length field that leads every frame.
pub const LEN_FIELD_SIZE: usize = 4;

/// Default cap on a single inbound frame: 16 MiB.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// One length-prefixed unit of inbound data.
///
/// `len` counts the length field itself, so `payload.len() == len as usize`
/// and the first four payload bytes echo the length field exactly as read
/// off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub len: u32,
    pub payload: Bytes,
}

/// Reads successive frames from an async byte stream.
pub struct FrameReader<R> {
    transport: R,
    read_buf: BytesMut,
    codec: FrameCodec,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(transport: R, max_frame_len: u32) -> Self {
        Self {
            transport,
            read_buf: BytesMut::new(),
            codec: FrameCodec::with_max_frame_len(max_frame_len),
        }
    }

    /// Read the next complete frame, accumulating across short reads.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly at a frame boundary.
    /// EOF in the middle of a frame is an error, as is any other I/O
    /// failure; both are fatal to this stream only.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buf)? {
                return Ok(Some(frame));
            }
            let n = self.transport.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stream ended inside a frame",
                )));
            }
        }
    }
}
