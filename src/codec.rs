//! Little-endian wire encoding helpers.
//!
//! Writers append fixed-width integers and length-prefixed strings; the reader is total, so any
//! truncated or malformed input surfaces as [`ChainError::NotValid`] instead of partial state.

use crate::error::ChainError;

#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, x: u8) -> &mut Self {
        self.buf.push(x);
        self
    }

    pub fn put_i8(&mut self, x: i8) -> &mut Self {
        self.buf.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn put_i16(&mut self, x: i16) -> &mut Self {
        self.buf.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn put_i32(&mut self, x: i32) -> &mut Self {
        self.buf.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn put_u32(&mut self, x: u32) -> &mut Self {
        self.buf.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn put_i64(&mut self, x: i64) -> &mut Self {
        self.buf.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn put_u64(&mut self, x: u64) -> &mut Self {
        self.buf.extend_from_slice(&x.to_le_bytes());
        self
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// One-byte length prefix counting UTF-8 bytes.
    pub fn put_short_str(&mut self, s: &str) -> Result<&mut Self, ChainError> {
        let len = u8::try_from(s.len()).map_err(|_| {
            ChainError::NotValid(format!("String of {} bytes does not fit a one-byte length", s.len()))
        })?;
        Ok(self.put_u8(len).put_bytes(s.as_bytes()))
    }

    /// Two-byte length prefix counting UTF-8 bytes.
    pub fn put_str(&mut self, s: &str) -> Result<&mut Self, ChainError> {
        let len = i16::try_from(s.len()).map_err(|_| {
            ChainError::NotValid(format!("String of {} bytes does not fit a two-byte length", s.len()))
        })?;
        Ok(self.put_i16(len).put_bytes(s.as_bytes()))
    }

    /// Four-byte length prefix.
    pub fn put_blob(&mut self, bytes: &[u8]) -> &mut Self {
        self.put_i32(bytes.len() as i32);
        self.put_bytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ChainError> {
        if self.remaining() < n {
            return Err(ChainError::NotValid(format!(
                "Unexpected end of data: wanted {} bytes at offset {}, {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], ChainError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, ChainError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn i8(&mut self) -> Result<i8, ChainError> {
        Ok(i8::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, ChainError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, ChainError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, ChainError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, ChainError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, ChainError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// `max_chars` bounds characters; a character takes at most three bytes on the wire.
    fn utf8(&mut self, len: usize, max_chars: usize) -> Result<String, ChainError> {
        if len > max_chars.saturating_mul(3) {
            return Err(ChainError::NotValid(format!(
                "String of {} bytes exceeds maximum of {} characters",
                len, max_chars
            )));
        }
        let bytes = self.take(len)?;
        let s = String::from_utf8(bytes.to_vec())
            .map_err(|e| ChainError::NotValid(format!("Invalid UTF-8: {}", e)))?;
        let chars = s.chars().count();
        if chars > max_chars {
            return Err(ChainError::NotValid(format!(
                "String length {} exceeds maximum {}",
                chars, max_chars
            )));
        }
        Ok(s)
    }

    pub fn short_str(&mut self, max_chars: usize) -> Result<String, ChainError> {
        let len = self.u8()? as usize;
        self.utf8(len, max_chars)
    }

    pub fn str(&mut self, max_chars: usize) -> Result<String, ChainError> {
        let len = self.i16()?;
        if len < 0 {
            return Err(ChainError::NotValid(format!("Negative string length {}", len)));
        }
        self.utf8(len as usize, max_chars)
    }

    pub fn blob(&mut self, max_len: usize) -> Result<Vec<u8>, ChainError> {
        let len = self.i32()?;
        if len < 0 || len as usize > max_len {
            return Err(ChainError::NotValid(format!(
                "Blob length {} out of range (max {})",
                len, max_len
            )));
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    /// Fails if unread bytes remain.
    pub fn finish(&self) -> Result<(), ChainError> {
        if self.remaining() != 0 {
            return Err(ChainError::NotValid(format!(
                "{} trailing bytes after decoding",
                self.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut w = ByteWriter::new();
        w.put_i32(1).put_u64(0x0102);
        assert_eq!(w.into_bytes(), vec![1, 0, 0, 0, 2, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_truncated_input_is_not_valid() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert!(matches!(r.i32(), Err(ChainError::NotValid(_))));
    }

    #[test]
    fn test_string_length_limit() {
        let mut w = ByteWriter::new();
        w.put_str("abcdef").unwrap();
        let bytes = w.into_bytes();
        assert!(ByteReader::new(&bytes).str(5).is_err());
        assert_eq!(ByteReader::new(&bytes).str(6).unwrap(), "abcdef");
    }

    #[test]
    fn test_length_prefix_counts_bytes() {
        let accented = "é".repeat(1000);
        let mut w = ByteWriter::new();
        w.put_str(&accented).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..2], &2000i16.to_le_bytes());
        assert_eq!(ByteReader::new(&bytes).str(1000).unwrap(), accented);
        assert!(ByteReader::new(&bytes).str(999).is_err());
    }

    #[test]
    fn test_oversized_strings_are_refused() {
        let mut w = ByteWriter::new();
        assert!(matches!(w.put_short_str(&"€".repeat(100)), Err(ChainError::NotValid(_))));
        assert!(matches!(w.put_str(&"x".repeat(40_000)), Err(ChainError::NotValid(_))));
        assert!(w.is_empty());
        w.put_short_str(&"€".repeat(85)).unwrap();
        assert_eq!(w.len(), 1 + 255);
    }

    #[test]
    fn test_finish_rejects_trailing_bytes() {
        let mut r = ByteReader::new(&[7, 0]);
        assert_eq!(r.u8().unwrap(), 7);
        assert!(r.finish().is_err());
    }
}
