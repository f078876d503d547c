use std::time::Duration;

/// Errors that can occur in link session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No ready record arrived before the handshake deadline.
    #[error("no ready reply from device within {0:?}")]
    HandshakeTimeout(Duration),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rovlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] rovlink_frame::FrameError),

    /// A command could not be framed.
    #[error("record error: {0}")]
    Record(#[from] rovlink_records::RecordError),

    /// The device end of the stream went away.
    #[error("device disconnected")]
    Disconnected,

    /// The session was shut down.
    #[error("session is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
