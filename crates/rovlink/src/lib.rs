//! Host and device tooling for the rover serial link.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial TTY and Unix socket streams
//! - [`frame`]: checksummed text frames, stream scanner, sequence tracking
//! - [`records`]: typed telemetry records, commands and the dispatcher
//! - [`session`]: host-side link session (behind `session` feature)
//! - [`device`]: device controller, interlock and simulator (behind `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use rovlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rovlink_frame::*;
}

/// Re-export record and command types.
pub mod records {
    pub use rovlink_records::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use rovlink_session::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use rovlink_device::*;
}
