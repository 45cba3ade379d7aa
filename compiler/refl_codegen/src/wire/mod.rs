//! Reference model of the buffer format the generated streamers speak.
//!
//! ```text
//! fundamental   big-endian, at its declared width
//! enumeral      i32
//! narrowed      f32
//! string        u8 length, or 255 followed by a u32 length; then bytes
//! container     i32 element count, then the elements
//! envelope      u32 byte count with bit 30 set, u16 version, ..., checked
//! ```
//!
//! [`WireWriter`] and [`WireReader`] implement the primitives; the
//! [`Interpreter`] executes member stream plans on top of them so that the
//! round-trip contract of the generated code can be checked in Rust.

mod interp;

pub use interp::{Interpreter, Object, Value};

use thiserror::Error;

/// Bit marking a byte count in the envelope.
pub const BYTE_COUNT_MASK: u32 = 0x4000_0000;

/// Strings at least this long use the extended length prefix.
const LONG_STRING: u8 = 255;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("unexpected end of buffer at offset {offset}: {needed} more bytes needed")]
    UnexpectedEnd { offset: usize, needed: usize },
    #[error("{count} bytes left over after the object")]
    TrailingBytes { count: usize },
    #[error("envelope of `{class}` has no byte count")]
    MissingByteCount { class: String },
    #[error("`{class}`: byte count says {expected} bytes, {actual} were read")]
    ByteCountMismatch {
        class: String,
        expected: u32,
        actual: usize,
    },
    #[error("no class named `{0}`")]
    UnknownClass(String),
    #[error("`{class}` has a custom Streamer the model cannot run")]
    CustomStreamer { class: String },
    #[error("`{class}` cannot be streamed: {reason}")]
    Unstreamable { class: String, reason: String },
    #[error("`{member}`: expected {expected}")]
    TypeMismatch {
        member: String,
        expected: &'static str,
    },
    #[error("`{member}` has no value")]
    MissingValue { member: String },
    #[error("`{member}`: expected {expected} elements, found {actual}")]
    LengthMismatch {
        member: String,
        expected: usize,
        actual: usize,
    },
    #[error("`{member}`: length `{expression}` cannot be evaluated")]
    UnsupportedLength { member: String, expression: String },
    #[error("invalid element count {0}")]
    InvalidCount(i64),
    #[error("string is not valid UTF-8")]
    InvalidString,
    #[error("version {0} does not fit the envelope")]
    InvalidVersion(i32),
}

/// Envelope state between [`WireReader::read_envelope`] and
/// [`WireReader::check_envelope`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub version: u16,
    /// Offset right after the byte count.
    start: usize,
    count: u32,
}

/// Appends values to a growing buffer.
#[derive(Clone, Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        match u8::try_from(bytes.len()) {
            Ok(len) if len < LONG_STRING => self.write_u8(len),
            _ => {
                self.write_u8(LONG_STRING);
                // Longer strings do not occur in a single member.
                self.write_u32(u32::try_from(bytes.len()).unwrap_or(u32::MAX));
            }
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Open an envelope: a byte count placeholder and the version.
    ///
    /// Returns the position to hand to [`end_envelope`](Self::end_envelope).
    pub fn begin_envelope(&mut self, version: u16) -> usize {
        let position = self.buf.len();
        self.write_u32(0);
        self.write_u16(version);
        position
    }

    /// Patch the byte count of the envelope opened at `position`.
    pub fn end_envelope(&mut self, position: usize) {
        let count = self.buf.len() - position - 4;
        let count = u32::try_from(count).unwrap_or(u32::MAX) & !BYTE_COUNT_MASK;
        let bytes = (count | BYTE_COUNT_MASK).to_be_bytes();
        self.buf[position..position + 4].copy_from_slice(&bytes);
    }
}

/// Reads values from a byte slice.
#[derive(Clone, Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        WireReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let bytes = self.take_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < len {
            return Err(WireError::UnexpectedEnd {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(u8::from_be_bytes(self.take()?))
    }

    pub fn read_i8(&mut self) -> Result<i8, WireError> {
        Ok(i8::from_be_bytes(self.take()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, WireError> {
        Ok(f32::from_be_bytes(self.take()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_be_bytes(self.take()?))
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = match self.read_u8()? {
            LONG_STRING => self.read_u32()? as usize,
            len => usize::from(len),
        };
        let bytes = self.take_slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidString)
    }

    /// Element count of a container or narrowed array.
    pub fn read_count(&mut self) -> Result<usize, WireError> {
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| WireError::InvalidCount(i64::from(count)))
    }

    pub fn read_envelope(&mut self, class: &str) -> Result<Envelope, WireError> {
        let raw = self.read_u32()?;
        if raw & BYTE_COUNT_MASK == 0 {
            return Err(WireError::MissingByteCount {
                class: class.to_string(),
            });
        }
        let start = self.pos;
        let version = self.read_u16()?;
        Ok(Envelope {
            version,
            start,
            count: raw & !BYTE_COUNT_MASK,
        })
    }

    /// The bytes consumed since the envelope was opened must match its
    /// byte count.
    pub fn check_envelope(&self, envelope: Envelope, class: &str) -> Result<(), WireError> {
        let actual = self.pos - envelope.start;
        if actual == envelope.count as usize {
            Ok(())
        } else {
            Err(WireError::ByteCountMismatch {
                class: class.to_string(),
                expected: envelope.count,
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests;
