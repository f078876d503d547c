use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// First start sentinel.
pub const START0: u8 = 0x12;
/// Second start sentinel.
pub const START1: u8 = 0x13;
/// Frame terminator.
pub const STOP: u8 = b'\n';
/// Segment separator.
pub const DELIMITER: u8 = b'\t';

/// Smallest body that can hold a sequence digit, a TAB, a category byte and
/// two checksum digits.
pub const MIN_BODY_LEN: usize = 5;

/// Default upper bound on a frame body, sentinels excluded.
pub const DEFAULT_MAX_FRAME_LEN: usize = 512;

/// Number of decimals written for float fields.
pub const FLOAT_DECIMALS: usize = 4;

/// Bytes that may never appear inside a segment.
pub const RESERVED: [u8; 4] = [START0, START1, STOP, DELIMITER];

/// A text segment guaranteed to be free of reserved bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Validate `text` as a segment.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if let Some(&byte) = text.as_bytes().iter().find(|b| RESERVED.contains(b)) {
            return Err(FrameError::ReservedByte { byte });
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Token {
    type Error = FrameError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

/// One positional value in an outgoing frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(Token),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{v}"),
            Field::Uint(v) => write!(f, "{v}"),
            Field::Float(v) => write!(f, "{v:.prec$}", prec = FLOAT_DECIMALS),
            Field::Text(t) => f.write_str(t.as_str()),
        }
    }
}

macro_rules! field_from {
    ($variant:ident, $target:ty: $($ty:ty),+) => {
        $(impl From<$ty> for Field {
            fn from(value: $ty) -> Self {
                Field::$variant(<$target>::from(value))
            }
        })+
    };
}

field_from!(Int, i64: i8, i16, i32, i64);
field_from!(Uint, u64: u8, u16, u32, u64, bool);
field_from!(Float, f64: f32, f64);

impl From<Token> for Field {
    fn from(value: Token) -> Self {
        Field::Text(value)
    }
}

/// A category plus its typed fields, ready to be sequenced and encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingFrame {
    category: Token,
    fields: Vec<Field>,
}

impl OutgoingFrame {
    /// Build a frame. The category must be non-empty and free of reserved
    /// bytes.
    pub fn new(category: &str, fields: Vec<Field>) -> Result<Self> {
        if category.is_empty() {
            return Err(FrameError::MissingCategory);
        }
        Ok(Self {
            category: Token::new(category)?,
            fields,
        })
    }

    pub fn category(&self) -> &str {
        self.category.as_str()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// A frame that passed the byte-level checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number the sender attached.
    pub sequence: u32,
    /// Category token.
    pub category: String,
    fields: Vec<String>,
}

impl Frame {
    pub fn new(sequence: u32, category: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            sequence,
            category: category.into(),
            fields,
        }
    }

    /// Field `index`, counted from the first segment after the category.
    pub fn field(&self, index: usize) -> Result<&str> {
        self.fields
            .get(index)
            .map(String::as_str)
            .ok_or(FrameError::MissingSegment(index))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Low eight bits of the byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode `frame` with sequence number `sequence` into `dst`.
///
/// Wire format:
/// ```text
/// 0x12 0x13 <seq> TAB <category> (TAB <field>)* <checksum: 2 hex> '\n'
/// ```
/// The checksum covers everything between the start sentinels and itself.
pub fn encode_frame(sequence: u32, frame: &OutgoingFrame, dst: &mut BytesMut) {
    dst.reserve(16 + frame.fields.len() * 8);
    dst.put_u8(START0);
    dst.put_u8(START1);
    let body_start = dst.len();

    dst.put_slice(sequence.to_string().as_bytes());
    dst.put_u8(DELIMITER);
    dst.put_slice(frame.category.as_str().as_bytes());
    for field in &frame.fields {
        dst.put_u8(DELIMITER);
        dst.put_slice(field.to_string().as_bytes());
    }

    let sum = checksum(&dst[body_start..]);
    dst.put_slice(format!("{sum:02x}").as_bytes());
    dst.put_u8(STOP);
}

/// Decode a frame body: the bytes between the start sentinels and STOP.
pub fn decode_frame(body: &[u8]) -> Result<Frame> {
    if body.len() < MIN_BODY_LEN {
        return Err(FrameError::TooShort { len: body.len() });
    }

    let (payload, digits) = body.split_at(body.len() - 2);
    let received = parse_checksum(digits)?;
    let calculated = checksum(payload);
    if received != calculated {
        return Err(FrameError::Checksum {
            received,
            calculated,
        });
    }

    let text = std::str::from_utf8(payload).map_err(|_| FrameError::Encoding)?;
    let mut segments = text.split(DELIMITER as char);

    let seq_text = segments.next().unwrap_or_default();
    let sequence = seq_text
        .parse::<u32>()
        .map_err(|_| FrameError::BadSequence(seq_text.to_string()))?;

    let category = match segments.next() {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => return Err(FrameError::MissingCategory),
    };

    Ok(Frame {
        sequence,
        category,
        fields: segments.map(str::to_string).collect(),
    })
}

fn parse_checksum(digits: &[u8]) -> Result<u8> {
    std::str::from_utf8(digits)
        .ok()
        .filter(|s| s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')))
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .ok_or_else(|| FrameError::ChecksumDigits(String::from_utf8_lossy(digits).into_owned()))
}

/// Configuration for the frame scanner and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Longest body accepted before the frame is dropped. Default: 512.
    pub max_frame_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
