use std::io;

/// Errors from inbound frame reading.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame length {0} is shorter than the 4-byte length field")]
    LengthTooSmall(u32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from connection setup: the address handshake, the register
/// message, and the downstream dial.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("truncated handshake: the first packet must be 128 bytes")]
    TruncatedHandshake,

    #[error("truncated register message: the second packet must be 32 bytes")]
    TruncatedRegister,

    #[error("handshake address is not valid UTF-8: {0}")]
    AddressNotUtf8(#[from] std::str::Utf8Error),

    #[error("handshake address is empty")]
    EmptyAddress,

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("downstream dial to {addr} failed: {source}")]
    DialFailed { addr: String, source: io::Error },
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
