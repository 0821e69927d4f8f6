//! Shared binary codec for durable metadata records.
//!
//! Every record that lands in the metadata journal is framed with the same
//! small set of primitives: big-endian fixed-width integers, one-byte
//! booleans, and length-prefixed byte strings. Factoring the framing into
//! one place keeps the persisted layouts bit-exact across releases; the
//! layouts are what crash recovery and replication replay against.
//!
//! Collections are written as an `i32` count followed by the elements, and
//! a zero count is how "absent" is encoded for optional collections; the
//! record types themselves decide whether zero reads back as `None` or as
//! an empty, initialized collection.

use bytes::{BufMut, Bytes, BytesMut};
use snafu::prelude::*;

use crate::error::{
    InvalidBoolSnafu, InvalidUtf8Snafu, NegativeCountSnafu, PersistError, UnexpectedEofSnafu,
};

/// Writer half of the codec. Appends primitives to an in-memory buffer;
/// writes cannot fail.
#[derive(Debug, Default)]
pub struct PersistWriter {
    buf: BytesMut,
}

impl PersistWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with a pre-sized buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Consume the writer and return the encoded bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Write a length-prefixed byte string (`u32` length + raw bytes).
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buf.put_u32(value.len() as u32);
        self.buf.put_slice(value);
    }

    /// Write a length-prefixed UTF-8 string. Same framing as
    /// [`write_bytes`](Self::write_bytes); the distinction only matters on
    /// the read side, where strings are validated.
    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }
}

/// Reader half of the codec. All reads are bounds-checked and return
/// [`PersistError`] instead of panicking on malformed input.
#[derive(Debug)]
pub struct PersistReader<'a> {
    buf: &'a [u8],
}

impl<'a> PersistReader<'a> {
    /// Create a reader over an encoded buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Whether the reader has consumed the whole buffer.
    pub fn is_exhausted(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PersistError> {
        ensure!(
            self.buf.len() >= len,
            UnexpectedEofSnafu {
                needed: len - self.buf.len(),
                remaining: self.buf.len(),
            }
        );
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> Result<u8, PersistError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, PersistError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, PersistError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, PersistError> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64, PersistError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }

    pub fn read_bool(&mut self) -> Result<bool, PersistError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => InvalidBoolSnafu { value }.fail(),
        }
    }

    /// Read a collection count, rejecting negative values.
    pub fn read_count(&mut self) -> Result<usize, PersistError> {
        let count = self.read_i32()?;
        ensure!(count >= 0, NegativeCountSnafu { count });
        Ok(count as usize)
    }

    /// Read a length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, PersistError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, PersistError> {
        String::from_utf8(self.read_bytes()?).context(InvalidUtf8Snafu)
    }
}

/// A record with a durable binary layout.
///
/// Implementations define the exact field order of their persisted image.
/// `write_to` is infallible (the writer is an in-memory buffer); `read_from`
/// must tolerate arbitrary input and report corruption as [`PersistError`].
pub trait Persist: Sized {
    /// Append this record's persisted image to `out`.
    fn write_to(&self, out: &mut PersistWriter);

    /// Reconstruct a record from its persisted image.
    fn read_from(input: &mut PersistReader<'_>) -> Result<Self, PersistError>;
}

/// Encode a record into a standalone buffer.
pub fn to_bytes<P: Persist>(record: &P) -> Bytes {
    let mut writer = PersistWriter::new();
    record.write_to(&mut writer);
    writer.finish()
}

/// Decode a record from a standalone buffer.
pub fn from_bytes<P: Persist>(buf: &[u8]) -> Result<P, PersistError> {
    P::read_from(&mut PersistReader::new(buf))
}
