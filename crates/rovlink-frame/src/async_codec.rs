use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{encode_frame, Frame, FrameConfig, OutgoingFrame};
use crate::error::FrameError;
use crate::scanner::Scanner;

/// `tokio_util` codec for the link frame format.
///
/// Decoding skips rejected frames and device log lines, yielding only frames
/// that passed the byte-level checks. Encoding takes `(sequence, frame)`.
#[derive(Debug)]
pub struct RovlinkCodec {
    scanner: Scanner,
    rejected: u64,
}

impl RovlinkCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self {
            scanner: Scanner::new(&config),
            rejected: 0,
        }
    }

    /// Frames dropped by the byte-level checks.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Device log lines skipped.
    pub fn log_lines(&self) -> u64 {
        self.scanner.log_lines()
    }
}

impl Default for RovlinkCodec {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}

impl Decoder for RovlinkCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        while src.has_remaining() {
            match self.scanner.push(src.get_u8()) {
                Some(Ok(frame)) => return Ok(Some(frame)),
                Some(Err(err)) => {
                    self.rejected += 1;
                    warn!(error = %err, "dropping malformed frame");
                }
                None => {}
            }
        }
        Ok(None)
    }
}

impl Encoder<(u32, OutgoingFrame)> for RovlinkCodec {
    type Error = FrameError;

    fn encode(&mut self, item: (u32, OutgoingFrame), dst: &mut BytesMut) -> Result<(), FrameError> {
        let (sequence, frame) = item;
        encode_frame(sequence, &frame, dst);
        Ok(())
    }
}
