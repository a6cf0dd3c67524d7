use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Growable byte buffer with a read cursor.
///
/// Reads are bounds-checked and fail with [`Error::Truncated`] instead of
/// panicking, so it is safe to point at untrusted network input. Writes
/// always append at the end.
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl ByteBuffer {
    /// Create a new ByteBuffer from bytes
    pub fn new(data: Vec<u8>) -> Self {
        ByteBuffer {
            buffer: data,
            cursor: 0,
        }
    }

    /// Create an empty ByteBuffer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buffer: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Get current cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    /// Check if buffer has at least n bytes remaining
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        if !self.has_remaining(len) {
            return Err(Error::truncated(len, self.remaining()));
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.buffer[start..start + len])
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Result<u8> {
        self.buffer
            .get(self.cursor)
            .copied()
            .ok_or_else(|| Error::truncated(1, 0))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16_be(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_u24_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u24(self.take(3)?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    /// Read u32 (little endian) - only the message stream id uses this
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_f64_be(&mut self) -> Result<f64> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16_be(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_i16_be(&mut self, value: i16) {
        let mut bytes = [0u8; 2];
        BigEndian::write_i16(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    /// Write the low 24 bits of `value` (big endian)
    pub fn write_u24_be(&mut self, value: u32) {
        let mut bytes = [0u8; 3];
        BigEndian::write_u24(&mut bytes, value & 0x00FF_FFFF);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_u32_be(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        BigEndian::write_u32(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_f64_be(&mut self, value: f64) {
        let mut bytes = [0u8; 8];
        BigEndian::write_f64(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    /// Overwrite a previously written 24-bit field in place
    pub fn patch_u24_be(&mut self, pos: usize, value: u32) -> Result<()> {
        let end = pos + 3;
        if end > self.buffer.len() {
            return Err(Error::invalid_state(format!(
                "patch at {} beyond buffer length {}",
                pos,
                self.buffer.len()
            )));
        }
        BigEndian::write_u24(&mut self.buffer[pos..end], value & 0x00FF_FFFF);
        Ok(())
    }

    /// Get slice of underlying buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_mixed_endianness() {
        let mut buffer = ByteBuffer::with_capacity(16);
        buffer.write_u24_be(0x123456);
        buffer.write_u32_le(1);
        buffer.write_u16_be(0xBEEF);

        assert_eq!(buffer.as_slice(), &[0x12, 0x34, 0x56, 1, 0, 0, 0, 0xBE, 0xEF]);

        assert_eq!(buffer.read_u24_be().unwrap(), 0x123456);
        assert_eq!(buffer.read_u32_le().unwrap(), 1);
        assert_eq!(buffer.read_u16_be().unwrap(), 0xBEEF);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_patch_u24() {
        let mut buffer = ByteBuffer::with_capacity(8);
        buffer.write_u8(0xAA);
        buffer.write_u24_be(0);
        buffer.patch_u24_be(1, 300).unwrap();

        assert_eq!(buffer.as_slice(), &[0xAA, 0x00, 0x01, 0x2C]);
        assert!(buffer.patch_u24_be(2, 1).is_err());
    }

    #[test]
    fn test_truncated_read_reports_sizes() {
        let mut buffer = ByteBuffer::new(vec![1, 2]);

        assert!(buffer.read_u16_be().is_ok());
        match buffer.read_u32_be() {
            Err(Error::Truncated { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 0);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut buffer = ByteBuffer::new(vec![9, 8]);
        assert_eq!(buffer.peek_u8().unwrap(), 9);
        assert_eq!(buffer.read_u8().unwrap(), 9);
        assert_eq!(buffer.position(), 1);
    }
}
