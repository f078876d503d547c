use std::io::{Cursor, Read, Write};

use crate::error::Result;

/// A readable stream that can report how many bytes are ready without
/// blocking.
///
/// This is the poll primitive the link session is built on: callers check
/// availability once per scheduler tick and only then consume bytes.
pub trait PollRead: Read {
    /// Number of bytes that can be read right now without blocking.
    ///
    /// A descriptor whose peer has hung up reports at least one byte, so the
    /// next read returns end-of-stream instead of the caller polling forever.
    fn bytes_available(&mut self) -> std::io::Result<usize>;
}

impl<T: AsRef<[u8]>> PollRead for Cursor<T> {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        let len = self.get_ref().as_ref().len() as u64;
        Ok(len.saturating_sub(self.position()) as usize)
    }
}

impl PollRead for &[u8] {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        Ok(self.len())
    }
}

#[cfg(unix)]
impl PollRead for std::os::unix::net::UnixStream {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        use std::os::fd::AsRawFd;
        readable_now(self.as_raw_fd())
    }
}

/// A connected link stream: implements `Read + Write + PollRead`.
///
/// On the rover this wraps the serial TTY; in simulation it wraps a Unix
/// domain socket.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(unix)]
    Serial(std::fs::File),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Serial(file) => file.read(buf),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Serial(file) => file.write(buf),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Serial(file) => file.flush(),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl PollRead for LinkStream {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;
            let fd = match &self.inner {
                LinkStreamInner::Serial(file) => file.as_raw_fd(),
                LinkStreamInner::Unix(stream) => stream.as_raw_fd(),
            };
            readable_now(fd)
        }
    }
}

impl LinkStream {
    #[cfg(unix)]
    pub(crate) fn from_serial(file: std::fs::File) -> Self {
        Self {
            inner: LinkStreamInner::Serial(file),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    /// Clone the handle so reads and writes can be owned separately.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Serial(file) => Ok(Self::from_serial(file.try_clone()?)),
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Short transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Serial(_) => "serial",
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => "unix-socket",
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(unix)]
fn readable_now(fd: std::os::fd::RawFd) -> std::io::Result<usize> {
    let pending = fionread(fd)?;
    if pending > 0 {
        return Ok(pending);
    }

    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pfd` is a single valid pollfd and the timeout of zero makes
    // the call return immediately.
    let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let hung_up = rc > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP) != 0;
    Ok(usize::from(hung_up))
}

#[cfg(unix)]
fn fionread(fd: std::os::fd::RawFd) -> std::io::Result<usize> {
    let mut pending: libc::c_int = 0;
    // SAFETY: `fd` is an open descriptor owned by the caller for the duration
    // of the call and `pending` is a valid writable c_int, which is what
    // FIONREAD stores into.
    let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut pending as *mut libc::c_int) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(pending.max(0) as usize)
}
