//! Fixed-width big-endian integer primitives.
//!
//! Readers return `None` when the slice is too short, so callers parsing
//! untrusted input never index past the end. Writers expect a slice of at
//! least the value's width.

/// Read a big-endian `u16` from the start of `buf`.
#[inline]
pub fn read_u16_be(buf: &[u8]) -> Option<u16> {
    let bytes: [u8; 2] = buf.get(..2)?.try_into().ok()?;
    Some(u16::from_be_bytes(bytes))
}

/// Read a big-endian `u32` from the start of `buf`.
#[inline]
pub fn read_u32_be(buf: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Read a big-endian `u64` from the start of `buf`.
#[inline]
pub fn read_u64_be(buf: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = buf.get(..8)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Write `value` big-endian into the first 2 bytes of `buf`.
///
/// # Panics
///
/// Panics if `buf` is shorter than 2 bytes.
#[inline]
pub fn write_u16_be(buf: &mut [u8], value: u16) {
    buf[..2].copy_from_slice(&value.to_be_bytes());
}

/// Write `value` big-endian into the first 4 bytes of `buf`.
///
/// # Panics
///
/// Panics if `buf` is shorter than 4 bytes.
#[inline]
pub fn write_u32_be(buf: &mut [u8], value: u32) {
    buf[..4].copy_from_slice(&value.to_be_bytes());
}

/// Write `value` big-endian into the first 8 bytes of `buf`.
///
/// # Panics
///
/// Panics if `buf` is shorter than 8 bytes.
#[inline]
pub fn write_u64_be(buf: &mut [u8], value: u64) {
    buf[..8].copy_from_slice(&value.to_be_bytes());
}
