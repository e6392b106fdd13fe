//! TLV message writer.

use super::{MAX_VALUE_LEN, TLV_MAGIC};
use crate::binary::{write_u16_be, write_u32_be, write_u64_be};
use crate::error::{BtpError, Result};

/// Accumulates TLV records behind a single magic preamble.
///
/// The preamble is written lazily on the first record. `clear()` keeps the
/// allocated capacity so one writer can be reused across messages.
#[derive(Debug, Clone, Default)]
pub struct TlvWriter {
    buffer: Vec<u8>,
}

impl TlvWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// The encoded message (empty until the first record is written).
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of encoded bytes, preamble included.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Reset the writer without releasing capacity.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Consume the writer and return the encoded message.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Append a raw record.
    ///
    /// # Errors
    ///
    /// Returns `ValueTooLong` if `value` exceeds 255 bytes; nothing is written.
    pub fn write_bytes(&mut self, tlv_type: u8, value: &[u8]) -> Result<()> {
        if value.len() > MAX_VALUE_LEN {
            return Err(BtpError::ValueTooLong { len: value.len() });
        }
        self.push_record(tlv_type, value, &[]);
        Ok(())
    }

    /// Append a 1-byte record.
    pub fn write_u8(&mut self, tlv_type: u8, value: u8) {
        self.push_record(tlv_type, &[value], &[]);
    }

    /// Append a 2-byte big-endian record.
    pub fn write_u16(&mut self, tlv_type: u8, value: u16) {
        let mut buf = [0u8; 2];
        write_u16_be(&mut buf, value);
        self.push_record(tlv_type, &buf, &[]);
    }

    /// Append a 4-byte big-endian record.
    pub fn write_u32(&mut self, tlv_type: u8, value: u32) {
        let mut buf = [0u8; 4];
        write_u32_be(&mut buf, value);
        self.push_record(tlv_type, &buf, &[]);
    }

    /// Append an 8-byte big-endian record.
    pub fn write_u64(&mut self, tlv_type: u8, value: u64) {
        let mut buf = [0u8; 8];
        write_u64_be(&mut buf, value);
        self.push_record(tlv_type, &buf, &[]);
    }

    /// Append a NUL-terminated string record.
    ///
    /// At most `max_size` bytes of `value` are kept (and never more than 254,
    /// so the terminator still fits); the record length is `kept + 1`.
    pub fn write_str(&mut self, tlv_type: u8, value: &str, max_size: usize) {
        let kept = value.len().min(max_size).min(MAX_VALUE_LEN - 1);
        self.push_record(tlv_type, &value.as_bytes()[..kept], &[0]);
    }

    fn push_record(&mut self, tlv_type: u8, value: &[u8], suffix: &[u8]) {
        if self.buffer.is_empty() {
            self.buffer.extend_from_slice(&TLV_MAGIC);
        }
        self.buffer.push(tlv_type);
        self.buffer.push((value.len() + suffix.len()) as u8);
        self.buffer.extend_from_slice(value);
        self.buffer.extend_from_slice(suffix);
    }
}
