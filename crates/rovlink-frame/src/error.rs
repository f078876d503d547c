/// Errors that can occur while scanning, decoding or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The body is shorter than the smallest possible frame.
    #[error("frame body too short ({len} bytes)")]
    TooShort { len: usize },

    /// The body grew past the configured limit without a terminator.
    #[error("frame exceeds {max} bytes without a terminator")]
    Oversized { max: usize },

    /// A new start sentinel arrived before the current frame was terminated.
    #[error("frame interrupted by a new start sentinel after {len} bytes")]
    Interrupted { len: usize },

    /// The trailing checksum is not two hex digits.
    #[error("malformed checksum digits {0:?}")]
    ChecksumDigits(String),

    /// The checksum does not match the body.
    #[error("checksum mismatch: received {received:02x}, calculated {calculated:02x}")]
    Checksum { received: u8, calculated: u8 },

    /// The body is not valid text.
    #[error("frame body is not valid UTF-8")]
    Encoding,

    /// The first segment is not a decimal sequence number.
    #[error("invalid sequence number {0:?}")]
    BadSequence(String),

    /// The category segment is missing or empty.
    #[error("frame has no category")]
    MissingCategory,

    /// A field that the reader asked for is not present.
    #[error("missing field segment {0}")]
    MissingSegment(usize),

    /// A text segment contains a sentinel or separator byte.
    #[error("reserved byte 0x{byte:02x} in text segment")]
    ReservedByte { byte: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the stream is still usable after this error.
    ///
    /// Everything except I/O failure and a closed stream only costs the frame
    /// that caused it.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FrameError::Io(_) | FrameError::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
