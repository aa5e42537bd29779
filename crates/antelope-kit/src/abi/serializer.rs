//! Low-level little-endian byte writer and reader.
//!
//! Lengths and counts are `varuint32` (LEB128: 7 bits per byte, high bit set on every
//! byte but the last). `varint32` is zig-zag mapped onto `varuint32`.

use crate::error::SerializationError;

/// Largest count accepted for a collection whose elements encode to no bytes.
pub const MAX_ZERO_WIDTH_LEN: usize = 1 << 16;

/// Append-only binary writer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the writer and return the bytes written.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u128(&mut self, v: u128) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a LEB128 `varuint32`.
    pub fn write_varuint32(&mut self, mut v: u32) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Write a zig-zag `varint32`.
    pub fn write_varint32(&mut self, v: i32) {
        self.write_varuint32(((v << 1) ^ (v >> 31)) as u32);
    }

    /// Write raw bytes with no length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a `varuint32` length followed by the bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SerializationError> {
        self.write_len(bytes.len())?;
        self.write_raw(bytes);
        Ok(())
    }

    /// Write a collection length or count.
    pub fn write_len(&mut self, len: usize) -> Result<(), SerializationError> {
        let len = u32::try_from(len)
            .map_err(|_| SerializationError::invalid("varuint32", "length exceeds u32::MAX"))?;
        self.write_varuint32(len);
        Ok(())
    }
}

/// Cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True if every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail with [`SerializationError::TrailingBytes`] unless fully consumed.
    pub fn finish(&self) -> Result<(), SerializationError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(SerializationError::TrailingBytes(n)),
        }
    }

    /// Read `n` raw bytes.
    pub fn read_raw(&mut self, n: usize, what: &str) -> Result<&'a [u8], SerializationError> {
        if n > self.remaining() {
            return Err(SerializationError::UnexpectedEof(what.to_string()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], SerializationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N, what)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, what: &str) -> Result<u8, SerializationError> {
        Ok(self.read_array::<1>(what)?[0])
    }

    pub fn read_u16(&mut self, what: &str) -> Result<u16, SerializationError> {
        self.read_array(what).map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self, what: &str) -> Result<u32, SerializationError> {
        self.read_array(what).map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self, what: &str) -> Result<u64, SerializationError> {
        self.read_array(what).map(u64::from_le_bytes)
    }

    pub fn read_u128(&mut self, what: &str) -> Result<u128, SerializationError> {
        self.read_array(what).map(u128::from_le_bytes)
    }

    /// Read a LEB128 `varuint32`.
    pub fn read_varuint32(&mut self, what: &str) -> Result<u32, SerializationError> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.read_u8(what)?;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(SerializationError::invalid("varuint32", "encoding too long"));
            }
        }
        u32::try_from(value).map_err(|_| SerializationError::invalid("varuint32", "value overflows u32"))
    }

    /// Read a zig-zag `varint32`.
    pub fn read_varint32(&mut self, what: &str) -> Result<i32, SerializationError> {
        let v = self.read_varuint32(what)?;
        Ok(((v >> 1) as i32) ^ -((v & 1) as i32))
    }

    /// Read a `varuint32` length followed by that many bytes.
    pub fn read_bytes(&mut self, what: &str) -> Result<&'a [u8], SerializationError> {
        let len = self.read_varuint32(what)? as usize;
        self.read_raw(len, what)
    }

    /// Read a collection count.
    ///
    /// `min_element_size` is the fewest bytes one element can encode to. Counts that
    /// cannot fit the unread input are rejected; zero-width elements are capped at
    /// [`MAX_ZERO_WIDTH_LEN`] instead.
    pub fn read_len(&mut self, what: &str, min_element_size: usize) -> Result<usize, SerializationError> {
        let len = self.read_varuint32(what)? as usize;
        if min_element_size == 0 {
            if len > MAX_ZERO_WIDTH_LEN {
                return Err(SerializationError::InvalidValue {
                    type_name: what.to_string(),
                    message: format!("{} zero-width elements exceed the limit", len),
                });
            }
        } else if len.saturating_mul(min_element_size) > self.remaining() {
            return Err(SerializationError::UnexpectedEof(what.to_string()));
        }
        Ok(len)
    }
}
