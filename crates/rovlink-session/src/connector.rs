use std::path::Path;

use rovlink_transport::{open_link, LinkStream, SerialOptions};
use tracing::info;

use crate::error::Result;
use crate::session::{LinkSession, SessionConfig};

/// Open the device at `path`, complete the handshake and return the session.
///
/// `path` may be a serial device or a Unix socket served by a simulator.
pub fn connect(
    path: impl AsRef<Path>,
    serial: &SerialOptions,
    config: SessionConfig,
) -> Result<LinkSession<LinkStream, LinkStream>> {
    let path = path.as_ref();
    let stream = open_link(path, serial)?;
    let writer = stream.try_clone()?;

    let mut session = LinkSession::new(stream, writer, config);
    let result = session.handshake()?;
    info!(
        path = %path.display(),
        device = %result.device_name,
        "rover link connected"
    );
    Ok(session)
}
