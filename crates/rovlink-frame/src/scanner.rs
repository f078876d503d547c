use bytes::BytesMut;
use tracing::debug;

use crate::codec::{decode_frame, Frame, FrameConfig, START0, START1, STOP};
use crate::error::{FrameError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outside a frame; bytes belong to a device log line.
    Text,
    /// Saw START0, waiting to see whether START1 follows.
    Start0,
    /// Inside a frame body.
    Body,
    /// Dropping the rest of an oversized frame.
    Discard,
}

/// Byte-at-a-time frame finder.
///
/// Frames are `START0 START1 body STOP`. Anything terminated by STOP that was
/// not opened by both start bytes is a device log line: it is logged and
/// dropped. The scanner never looks back, so any byte sequence leaves it in a
/// state from which the next well-formed frame is found.
#[derive(Debug)]
pub struct Scanner {
    state: State,
    body: BytesMut,
    text: Vec<u8>,
    max_frame_len: usize,
    log_lines: u64,
}

impl Scanner {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            state: State::Text,
            body: BytesMut::with_capacity(config.max_frame_len),
            text: Vec::new(),
            max_frame_len: config.max_frame_len,
            log_lines: 0,
        }
    }

    /// Feed one byte. Returns a result whenever a frame ends, either decoded
    /// or rejected.
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame>> {
        match self.state {
            State::Text => {
                self.push_text(byte);
                None
            }
            State::Start0 => {
                if byte == START1 {
                    self.flush_partial_text();
                    self.body.clear();
                    self.state = State::Body;
                } else if byte == START0 {
                    self.text.push(START0);
                } else {
                    self.text.push(START0);
                    self.state = State::Text;
                    self.push_text(byte);
                }
                None
            }
            State::Body => match byte {
                STOP => {
                    self.state = State::Text;
                    let result = decode_frame(&self.body);
                    self.body.clear();
                    Some(result)
                }
                START0 => {
                    let len = self.body.len();
                    self.body.clear();
                    self.state = State::Start0;
                    Some(Err(FrameError::Interrupted { len }))
                }
                _ if self.body.len() >= self.max_frame_len => {
                    self.body.clear();
                    self.state = State::Discard;
                    Some(Err(FrameError::Oversized {
                        max: self.max_frame_len,
                    }))
                }
                _ => {
                    self.body.extend_from_slice(&[byte]);
                    None
                }
            },
            State::Discard => {
                match byte {
                    STOP => self.state = State::Text,
                    START0 => self.state = State::Start0,
                    _ => {}
                }
                None
            }
        }
    }

    /// Device log lines seen so far.
    pub fn log_lines(&self) -> u64 {
        self.log_lines
    }

    /// Drop any partially scanned frame or text.
    pub fn reset(&mut self) {
        self.state = State::Text;
        self.body.clear();
        self.text.clear();
    }

    fn push_text(&mut self, byte: u8) {
        match byte {
            START0 => self.state = State::Start0,
            STOP => {
                let line = String::from_utf8_lossy(&self.text);
                debug!(line = %line.trim_end_matches('\r'), "device log");
                self.log_lines += 1;
                self.text.clear();
            }
            _ if self.text.len() >= self.max_frame_len => {
                debug!(line = %String::from_utf8_lossy(&self.text), "device log (truncated)");
                self.log_lines += 1;
                self.text.clear();
                self.text.push(byte);
            }
            _ => self.text.push(byte),
        }
    }

    fn flush_partial_text(&mut self) {
        if !self.text.is_empty() {
            debug!(
                text = %String::from_utf8_lossy(&self.text),
                "discarding unterminated device text before frame"
            );
            self.text.clear();
        }
    }
}
