use rovlink_frame::FrameError;
use rovlink_records::RecordError;

/// Errors that stop the device link.
///
/// Sensor and actuator faults are not here: the controller logs them and
/// carries on with the flags they imply.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A report could not be framed.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// The host end of the stream went away.
    #[error("host disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, DeviceError>;
