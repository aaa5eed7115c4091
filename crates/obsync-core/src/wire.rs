//! Big-endian binary reader and writer.
//!
//! Integers are written most significant byte first. Strings carry their
//! UTF-8 byte length as a 7-bit encoded int (low group first, high bit set
//! on every byte but the last), followed by the bytes themselves.

use crate::error::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Longest accepted 7-bit encoded int, in bytes.
const MAX_VARINT_BYTES: usize = 5;

/// Append-only big-endian writer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Write a collection size as `int32`.
    ///
    /// Collections are bounded by `i32::MAX` entries on the wire.
    pub fn write_count(&mut self, count: usize) {
        self.buf.put_i32(count as i32);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_varint(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
    }

    /// Write an `int32` length followed by the raw bytes.
    pub fn write_blob(&mut self, value: &[u8]) {
        self.write_count(value.len());
        self.buf.put_slice(value);
    }

    fn write_varint(&mut self, mut value: u32) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Bounds-checked big-endian reader over a borrowed buffer.
///
/// Every read validates the remaining length before consuming anything.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn ensure(&self, needed: usize) -> Result<(), WireError> {
        if self.buf.len() < needed {
            return Err(WireError::UnexpectedEof {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    /// Read an `int32` collection size.
    ///
    /// Every encoded element takes at least one byte, so a count larger than
    /// the remaining input is rejected before any element is read.
    pub fn read_count(&mut self) -> Result<usize, WireError> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(WireError::NegativeCount(count));
        }
        let count = count as usize;
        if count > self.buf.len() {
            return Err(WireError::CountExceedsInput {
                count,
                remaining: self.buf.len(),
            });
        }
        Ok(count)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_varint()? as usize;
        let raw = self.read_bytes(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    /// Read an `int32` length followed by that many raw bytes.
    pub fn read_blob(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(WireError::NegativeCount(len));
        }
        self.read_bytes(len as usize)
    }

    fn read_varint(&mut self) -> Result<u32, WireError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                // a length never exceeds a signed 32-bit int
                if value > i32::MAX as u32 {
                    return Err(WireError::VarintOverflow);
                }
                return Ok(value);
            }
        }
        Err(WireError::VarintOverflow)
    }

    /// Require that the whole buffer was consumed.
    pub fn finish(self) -> Result<(), WireError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes(self.buf.len()))
        }
    }
}
