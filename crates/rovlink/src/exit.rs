use std::fmt;
use std::io;

use rovlink_frame::FrameError;
use rovlink_records::RecordError;
use rovlink_session::SessionError;
use rovlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. }
        | TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::UnsupportedBaud(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn record_error(context: &str, err: RecordError) -> CliError {
    match err {
        RecordError::Frame(err) => frame_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::HandshakeTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Record(err) => record_error(context, err),
        SessionError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
        SessionError::Closed => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn device_error(context: &str, err: rovlink_device::DeviceError) -> CliError {
    use rovlink_device::DeviceError;

    match err {
        DeviceError::Frame(err) => frame_error(context, err),
        DeviceError::Record(err) => record_error(context, err),
        DeviceError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn handshake_timeout_maps_to_timeout_code() {
        let err = session_error(
            "connect failed",
            SessionError::HandshakeTimeout(Duration::from_secs(5)),
        );
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn missing_port_is_a_transport_error() {
        let err = transport_error(
            "connect failed",
            TransportError::Open {
                path: "/dev/ttyNOPE".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn malformed_frames_are_invalid_data() {
        let err = frame_error("decode", FrameError::MissingCategory);
        assert_eq!(err.code, DATA_INVALID);
        let err = record_error("decode", RecordError::UnknownCategory("zz".into()));
        assert_eq!(err.code, DATA_INVALID);
    }
}
