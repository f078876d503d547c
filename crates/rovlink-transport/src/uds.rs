use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

// sockaddr_un.sun_path capacity, including the trailing NUL.
#[cfg(target_os = "linux")]
const SUN_PATH_MAX: usize = 108;
#[cfg(not(target_os = "linux"))]
const SUN_PATH_MAX: usize = 104;

/// Listening end of a simulated rover link.
///
/// The simulator binds one of these and the host connects to the same path as
/// if it were a serial device. The socket file is removed again when the
/// listener is dropped, provided it is still the file this listener created.
pub struct UnixLinkListener {
    listener: UnixListener,
    path: PathBuf,
    identity: (u64, u64),
}

impl UnixLinkListener {
    /// Bind a listener at `path`, replacing a stale socket left behind by an
    /// earlier run. Any other kind of file at `path` is left alone.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_path_len(&path)?;

        let bind_err = |source| TransportError::Bind {
            path: path.clone(),
            source,
        };

        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_socket() => {
                debug!(?path, "replacing stale link socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            }
            Ok(_) => {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "path exists and is not a socket",
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(bind_err(e)),
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        let meta = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "link socket listening");
        Ok(Self {
            listener,
            identity: (meta.dev(), meta.ino()),
            path,
        })
    }

    /// Block until a host connects.
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, _) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "host attached to link socket");
        Ok(LinkStream::from_unix(stream))
    }

    /// Connect to a listening link socket.
    pub fn connect(path: impl AsRef<Path>) -> Result<LinkStream> {
        let path = path.as_ref();
        check_path_len(path)?;
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to link socket");
        Ok(LinkStream::from_unix(stream))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixLinkListener {
    fn drop(&mut self) {
        let Ok(meta) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if meta.file_type().is_socket() && (meta.dev(), meta.ino()) == self.identity {
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "link socket was replaced; leaving it");
        }
    }
}

fn check_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= SUN_PATH_MAX {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: SUN_PATH_MAX,
        });
    }
    Ok(())
}
