//! Sentinel-delimited, checksummed text frames for the rover link.
//!
//! Every frame on the wire looks like:
//! - two start bytes (`0x12 0x13`)
//! - a decimal sequence number, TAB, a category token, TAB-separated fields
//! - two lowercase hex digits of checksum, then a newline
//!
//! Text between frames is device logging and is skipped by the scanner.

pub mod category;
pub mod codec;
pub mod error;
pub mod reader;
pub mod scanner;
pub mod sequence;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    checksum, decode_frame, encode_frame, Field, Frame, FrameConfig, OutgoingFrame, Token,
    DEFAULT_MAX_FRAME_LEN, START0, START1, STOP,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use scanner::Scanner;
pub use sequence::{SequenceGap, SequenceTracker};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::RovlinkCodec;
