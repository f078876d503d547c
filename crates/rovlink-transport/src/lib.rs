//! Byte-stream transports for the rovlink device link.
//!
//! The rover talks to its host over one full-duplex byte stream:
//! - a serial TTY in the field (raw mode, configurable baud)
//! - a Unix domain socket when the device is simulated
//!
//! Everything above this crate only sees [`LinkStream`] (or any other
//! [`PollRead`] + `Write` type) and never blocks waiting for bytes that are
//! not there yet.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::{LinkStream, PollRead};

#[cfg(unix)]
pub use serial::{open_serial, SerialOptions, DEFAULT_BAUD};
#[cfg(unix)]
pub use uds::UnixLinkListener;

/// Open a link endpoint by path.
///
/// A path that names a Unix socket is connected as a simulation socket;
/// anything else is treated as a serial device.
#[cfg(unix)]
pub fn open_link(path: impl AsRef<std::path::Path>, options: &SerialOptions) -> Result<LinkStream> {
    use std::os::unix::fs::FileTypeExt;

    let path = path.as_ref();
    let is_socket = std::fs::metadata(path)
        .map(|meta| meta.file_type().is_socket())
        .unwrap_or(false);

    if is_socket {
        UnixLinkListener::connect(path)
    } else {
        open_serial(path, options)
    }
}
