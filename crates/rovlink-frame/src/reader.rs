use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use rovlink_transport::PollRead;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::scanner::Scanner;

const READ_CHUNK_SIZE: usize = 1024;

/// Pulls frames out of a [`PollRead`] stream without blocking.
///
/// Bytes are only read when the stream reports them available, so a call
/// with nothing pending returns immediately.
pub struct FrameReader<T> {
    inner: T,
    pending: BytesMut,
    scanner: Scanner,
    config: FrameConfig,
}

impl<T: PollRead> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(READ_CHUNK_SIZE),
            scanner: Scanner::new(&config),
            config,
        }
    }

    /// Scan buffered and available bytes until one frame ends.
    ///
    /// Returns `Ok(None)` when no complete frame is available yet. A rejected
    /// frame comes back as a recoverable error; the reader stays usable.
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            while self.pending.has_remaining() {
                let byte = self.pending.get_u8();
                if let Some(result) = self.scanner.push(byte) {
                    return result.map(Some);
                }
            }

            let available = self.inner.bytes_available()?;
            if available == 0 {
                return Ok(None);
            }
            self.fill(available.min(READ_CHUNK_SIZE))?;
        }
    }

    /// Read and discard everything currently available.
    ///
    /// Returns the number of bytes dropped.
    pub fn drain(&mut self) -> Result<usize> {
        let mut dropped = self.pending.len();
        self.pending.clear();
        loop {
            let available = self.inner.bytes_available()?;
            if available == 0 {
                break;
            }
            dropped += self.fill(available.min(READ_CHUNK_SIZE))?;
            self.pending.clear();
        }
        self.scanner.reset();
        Ok(dropped)
    }

    /// Device log lines skipped so far.
    pub fn log_lines(&self) -> u64 {
        self.scanner.log_lines()
    }

    fn fill(&mut self, want: usize) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk[..want]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
