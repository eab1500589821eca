//! Fixed-width little-endian record codec.
//!
//! A [`RecordShape`] is an ordered list of integer [`Field`]s. A
//! [`RecordReader`] walks a byte stream strictly forward, one record at a
//! time, and never holds more than the record it is decoding:
//!
//! - a clean end-of-stream *at a record boundary* ends the sequence,
//! - any shortfall inside a record is a [`TraceError::TruncatedRecord`].
//!
//! Variable-length files (a header followed by `count` payload records) are
//! read by alternating shapes on the same reader; payloads that are not
//! needed can be skipped without decoding via [`RecordReader::skip_records`].

use crate::error::{Result, TraceError};
use crate::violation;
use std::io::{self, Read, Write};

/// Widest field any shape may declare.
pub const MAX_FIELD_WIDTH: usize = 8;

/// Most fields any shape may declare.
pub const MAX_FIELDS: usize = 4;

/// One little-endian integer field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    /// Width in bytes (`1..=8`; unsigned fields up to 7 so values fit `i64`).
    pub width: u8,
    /// Two's-complement sign extension on decode.
    pub signed: bool,
}

impl Field {
    /// Signed field of `width` bytes.
    #[must_use]
    pub const fn signed(width: u8) -> Self {
        Self { width, signed: true }
    }

    /// Unsigned field of `width` bytes.
    #[must_use]
    pub const fn unsigned(width: u8) -> Self {
        Self { width, signed: false }
    }

    /// Inclusive value range representable by this field.
    #[must_use]
    pub const fn range(self) -> (i64, i64) {
        let bits = self.width as u32 * 8;
        if self.signed {
            if bits >= 64 {
                (i64::MIN, i64::MAX)
            } else {
                (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
            }
        } else if bits >= 63 {
            (0, i64::MAX)
        } else {
            (0, (1i64 << bits) - 1)
        }
    }

    fn decode(self, bytes: &[u8]) -> i64 {
        let w = self.width as usize;
        let mut buf = [0u8; MAX_FIELD_WIDTH];
        buf[..w].copy_from_slice(&bytes[..w]);
        if self.signed && w < MAX_FIELD_WIDTH && bytes[w - 1] & 0x80 != 0 {
            buf[w..].fill(0xFF);
        }
        i64::from_le_bytes(buf)
    }
}

/// Named, ordered list of fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordShape {
    /// Human-readable name used in error messages.
    pub name: &'static str,
    /// Fields in wire order.
    pub fields: &'static [Field],
}

impl RecordShape {
    /// Declare a shape.
    ///
    /// # Panics
    /// Panics (at compile time for `const` shapes) on an empty shape, more
    /// than [`MAX_FIELDS`] fields, or a width outside `1..=8`.
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [Field]) -> Self {
        assert!(!fields.is_empty() && fields.len() <= MAX_FIELDS, "bad field count");
        let mut i = 0;
        while i < fields.len() {
            let w = fields[i].width as usize;
            assert!(w >= 1 && w <= MAX_FIELD_WIDTH, "bad field width");
            assert!(fields[i].signed || w < MAX_FIELD_WIDTH, "unsigned field too wide");
            i += 1;
        }
        Self { name, fields }
    }

    /// Encoded size of one record in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].width as usize;
            i += 1;
        }
        total
    }
}

/// One decoded record; values in field order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    values: [i64; MAX_FIELDS],
    len: usize,
}

impl Record {
    /// Value of field `i`.
    ///
    /// # Panics
    /// Panics if `i` is not a field of the shape that produced this record.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> i64 {
        self.as_slice()[i]
    }

    /// All values in field order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[i64] {
        &self.values[..self.len]
    }
}

/// Forward-only record cursor over a byte stream.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> RecordReader<R> {
    /// Wrap a byte stream positioned at a record boundary.
    pub const fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Decode the next record, or `None` at a clean end-of-stream.
    pub fn next_record(&mut self, shape: &RecordShape) -> Result<Option<Record>> {
        let start = self.offset;
        let mut values = [0i64; MAX_FIELDS];
        let mut buf = [0u8; MAX_FIELD_WIDTH];
        for (i, field) in shape.fields.iter().enumerate() {
            let w = field.width as usize;
            let got = self.fill(&mut buf[..w])?;
            if got == 0 && i == 0 {
                return Ok(None);
            }
            if got < w {
                return Err(TraceError::TruncatedRecord {
                    shape: shape.name,
                    field: i,
                    offset: start,
                    needed: w,
                    available: got,
                });
            }
            values[i] = field.decode(&buf);
        }
        Ok(Some(Record { values, len: shape.fields.len() }))
    }

    /// Decode a record that must be present (payload positions).
    pub fn expect_record(&mut self, shape: &RecordShape) -> Result<Record> {
        let offset = self.offset;
        self.next_record(shape)?.ok_or(TraceError::TruncatedRecord {
            shape: shape.name,
            field: 0,
            offset,
            needed: shape.fields[0].width as usize,
            available: 0,
        })
    }

    /// Skip `count` records of `shape` without decoding them.
    pub fn skip_records(&mut self, shape: &RecordShape, count: u64) -> Result<()> {
        let want = count.saturating_mul(shape.width() as u64);
        let got = io::copy(&mut self.inner.by_ref().take(want), &mut io::sink())?;
        self.offset += got;
        if got < want {
            let partial = (got % shape.width() as u64) as usize;
            return Err(TraceError::TruncatedRecord {
                shape: shape.name,
                field: 0,
                offset: self.offset - partial as u64,
                needed: shape.width(),
                available: partial,
            });
        }
        Ok(())
    }

    /// Turn the reader into a lazy sequence of `shape` records.
    #[must_use]
    pub fn records(self, shape: &RecordShape) -> Records<'_, R> {
        Records { reader: self, shape, done: false }
    }

    /// Read until `buf` is full or the stream ends; returns bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.inner.read(&mut buf[n..]) {
                Ok(0) => break,
                Ok(k) => n += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += n as u64;
        Ok(n)
    }
}

/// Lazy, finite, non-restartable sequence of records of one shape.
///
/// Fuses after the first error.
#[derive(Debug)]
pub struct Records<'s, R> {
    reader: RecordReader<R>,
    shape: &'s RecordShape,
    done: bool,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_record(self.shape) {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Encoder counterpart of [`RecordReader`].
#[derive(Debug)]
pub struct RecordWriter<W> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    /// Wrap a byte sink.
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encode one record; every value must fit its field.
    pub fn write_record(&mut self, shape: &RecordShape, values: &[i64]) -> Result<()> {
        if values.len() != shape.fields.len() {
            return Err(violation!(
                "{} record takes {} fields, got {}",
                shape.name,
                shape.fields.len(),
                values.len()
            ));
        }
        for (i, (field, &v)) in shape.fields.iter().zip(values).enumerate() {
            let (lo, hi) = field.range();
            if v < lo || v > hi {
                return Err(violation!(
                    "{} field {i}: value {v} outside [{lo}, {hi}]",
                    shape.name
                ));
            }
            self.inner.write_all(&v.to_le_bytes()[..field.width as usize])?;
        }
        Ok(())
    }

    /// Recover the sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
