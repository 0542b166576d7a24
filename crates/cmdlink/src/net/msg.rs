//! Little-endian byte and bit primitives for building and parsing messages.
//!
//! Byte writes and reads realign to the next byte boundary, so a message can
//! switch from a bit run back to whole bytes without extra bookkeeping.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("read past end of message: needed {needed} bits, {remaining} remaining")]
    Overrun { needed: usize, remaining: usize },
    #[error("unknown message tag {0}")]
    BadTag(u8),
    #[error("string is not NUL terminated")]
    BadString,
}

#[derive(Debug, Default, Clone)]
pub struct MessageWriter {
    data: Vec<u8>,
    current_byte: u8,
    bit_count: u8,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            ..Default::default()
        }
    }

    /// Bytes written so far, counting a partial bit byte as whole.
    pub fn len(&self) -> usize {
        self.data.len() + usize::from(self.bit_count > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_u8(&mut self, value: u8) {
        self.flush_bits();
        self.data.push(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.flush_bits();
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.flush_bits();
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.flush_bits();
        self.data.extend_from_slice(bytes);
    }

    /// Writes `value` followed by a NUL terminator.
    pub fn write_string(&mut self, value: &str) {
        self.flush_bits();
        self.data.extend(value.bytes().filter(|&b| b != 0));
        self.data.push(0);
    }

    /// Writes the low `bits` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, bits: u8) {
        debug_assert!(bits <= 32);
        for i in (0..bits).rev() {
            self.current_byte = (self.current_byte << 1) | ((value >> i) & 1) as u8;
            self.bit_count += 1;
            if self.bit_count == 8 {
                self.data.push(self.current_byte);
                self.current_byte = 0;
                self.bit_count = 0;
            }
        }
    }

    /// Writes a two's complement value truncated to `bits` bits.
    pub fn write_signed_bits(&mut self, value: i32, bits: u8) {
        let mask = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
        self.write_bits(value as u32 & mask, bits);
    }

    /// Pads a partial bit byte with zeros.
    pub fn flush_bits(&mut self) {
        if self.bit_count > 0 {
            self.data.push(self.current_byte << (8 - self.bit_count));
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// Overwrites an already written byte.
    pub fn patch_u8(&mut self, index: usize, value: u8) {
        self.data[index] = value;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.flush_bits();
        self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.current_byte = 0;
        self.bit_count = 0;
    }
}

#[derive(Debug, Clone)]
pub struct MessageReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    pub fn bits_remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_pos)
    }

    pub fn is_empty(&self) -> bool {
        self.byte_position() >= self.data.len()
    }

    /// Current position in whole bytes, rounding a partial byte up.
    pub fn byte_position(&self) -> usize {
        self.bit_pos.div_ceil(8)
    }

    fn ensure(&self, needed: usize) -> Result<(), MessageError> {
        let remaining = self.bits_remaining();
        if needed > remaining {
            return Err(MessageError::Overrun { needed, remaining });
        }
        Ok(())
    }

    fn align(&mut self) {
        self.bit_pos = self.byte_position() * 8;
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], MessageError> {
        self.align();
        self.ensure(N * 8)?;
        let start = self.bit_pos / 8;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[start..start + N]);
        self.bit_pos += N * 8;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, MessageError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, MessageError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, MessageError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_string(&mut self) -> Result<String, MessageError> {
        self.align();
        let start = self.bit_pos / 8;
        let rest = self.data.get(start..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(MessageError::BadString)?;
        self.bit_pos += (len + 1) * 8;
        Ok(String::from_utf8_lossy(&rest[..len]).into_owned())
    }

    pub fn read_bits(&mut self, bits: u8) -> Result<u32, MessageError> {
        debug_assert!(bits <= 32);
        self.ensure(bits as usize)?;
        let mut value = 0u32;
        for _ in 0..bits {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Ok(value)
    }

    /// Reads `bits` bits and sign-extends them.
    pub fn read_signed_bits(&mut self, bits: u8) -> Result<i32, MessageError> {
        let value = self.read_bits(bits)?;
        if bits == 0 || bits >= 32 {
            return Ok(value as i32);
        }
        let shift = 32 - bits as u32;
        Ok(((value << shift) as i32) >> shift)
    }

    /// Skips padding up to the next byte boundary.
    pub fn flush_bits(&mut self) {
        self.align();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_little_endian() {
        let mut writer = MessageWriter::new();
        writer.write_u8(0xAB);
        writer.write_i16(-2);
        writer.write_i32(0x0102_0304);
        assert_eq!(
            writer.as_bytes(),
            &[0xAB, 0xFE, 0xFF, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_bits_then_bytes() {
        let mut writer = MessageWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_signed_bits(-3, 5);
        writer.write_bits(1, 1);
        writer.write_u8(7);
        let data = writer.finish();
        assert_eq!(data.len(), 3);

        let mut reader = MessageReader::new(&data);
        assert_eq!(reader.read_bits(3), Ok(0b101));
        assert_eq!(reader.read_signed_bits(5), Ok(-3));
        assert_eq!(reader.read_bits(1), Ok(1));
        assert_eq!(reader.read_u8(), Ok(7));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_string_terminated() {
        let mut writer = MessageWriter::new();
        writer.write_string("name");
        writer.write_string("");
        let data = writer.finish();
        assert_eq!(data, b"name\0\0");

        let mut reader = MessageReader::new(&data);
        assert_eq!(reader.read_string().as_deref(), Ok("name"));
        assert_eq!(reader.read_string().as_deref(), Ok(""));
        assert!(reader.read_string().is_err());
    }

    #[test]
    fn test_overrun_reported() {
        let mut reader = MessageReader::new(&[1]);
        assert_eq!(
            reader.read_i16(),
            Err(MessageError::Overrun {
                needed: 16,
                remaining: 8
            })
        );
    }
}
