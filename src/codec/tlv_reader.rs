//! Streaming TLV reader.
//!
//! Pulls bytes from any [`std::io::Read`] source into a fixed staging buffer,
//! so a message never has to be resident in memory at once. Complete records
//! are dispatched as soon as they are staged; a partial record is slid to the
//! front of the buffer and completed by the next pull.
//!
//! Dispatch is typed and strict:
//! - fixed-width handlers fire only when the value length equals the width
//! - string handlers always fire, cut at the first NUL byte
//! - records without a registered handler are skipped

use std::collections::HashMap;
use std::io::{ErrorKind, Read};

use super::{TLV_MAGIC, TYPE_LENGTH_SIZE};
use crate::binary::{read_u16_be, read_u32_be, read_u64_be};
use crate::error::{BtpError, Result};

/// Staging buffer size. Always larger than one maximal record (257 bytes).
pub const STAGING_BUFFER_SIZE: usize = 1024;

/// One registered interpretation of a record type.
pub enum TlvHandler<'a> {
    /// Exactly 1 byte.
    U8(Box<dyn FnMut(u8, u8) + 'a>),
    /// Exactly 2 bytes, big-endian.
    U16(Box<dyn FnMut(u8, u16) + 'a>),
    /// Exactly 4 bytes, big-endian.
    U32(Box<dyn FnMut(u8, u32) + 'a>),
    /// Exactly 8 bytes, big-endian.
    U64(Box<dyn FnMut(u8, u64) + 'a>),
    /// Any length; NUL-terminated by convention.
    Str(Box<dyn FnMut(u8, String) + 'a>),
}

impl<'a> TlvHandler<'a> {
    pub fn u8(f: impl FnMut(u8, u8) + 'a) -> Self {
        TlvHandler::U8(Box::new(f))
    }

    pub fn u16(f: impl FnMut(u8, u16) + 'a) -> Self {
        TlvHandler::U16(Box::new(f))
    }

    pub fn u32(f: impl FnMut(u8, u32) + 'a) -> Self {
        TlvHandler::U32(Box::new(f))
    }

    pub fn u64(f: impl FnMut(u8, u64) + 'a) -> Self {
        TlvHandler::U64(Box::new(f))
    }

    pub fn string(f: impl FnMut(u8, String) + 'a) -> Self {
        TlvHandler::Str(Box::new(f))
    }

    fn width(&self) -> Option<usize> {
        match self {
            TlvHandler::U8(_) => Some(1),
            TlvHandler::U16(_) => Some(2),
            TlvHandler::U32(_) => Some(4),
            TlvHandler::U64(_) => Some(8),
            TlvHandler::Str(_) => None,
        }
    }
}

/// Adapter turning a pull callback `(dst) -> bytes_read` into a [`Read`] source.
///
/// Returning 0 signals the end of the message.
pub struct FnSource<F>(pub F);

impl<F> Read for FnSource<F>
where
    F: FnMut(&mut [u8]) -> usize,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = (self.0)(buf);
        Ok(n.min(buf.len()))
    }
}

/// Streaming TLV parser with per-type handlers.
pub struct TlvReader<'a, R> {
    source: R,
    handlers: HashMap<u8, TlvHandler<'a>>,
}

impl<'a, 'b> TlvReader<'a, &'b [u8]> {
    /// Read from an in-memory buffer.
    pub fn from_slice(buffer: &'b [u8]) -> Self {
        Self::new(buffer)
    }
}

impl<'a, F> TlvReader<'a, FnSource<F>>
where
    F: FnMut(&mut [u8]) -> usize,
{
    /// Read from a pull callback.
    pub fn from_fn(read: F) -> Self {
        Self::new(FnSource(read))
    }
}

impl<'a, R: Read> TlvReader<'a, R> {
    /// Read from any byte source.
    pub fn new(source: R) -> Self {
        Self {
            source,
            handlers: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for a record type.
    pub fn register_handler(&mut self, tlv_type: u8, handler: TlvHandler<'a>) {
        self.handlers.insert(tlv_type, handler);
    }

    /// Validate the preamble and dispatch every record of the message.
    ///
    /// # Errors
    ///
    /// - `InvalidMagic` if the preamble is missing or wrong; no handler runs.
    /// - `Truncated` if the source ends inside a record. Records completed
    ///   before the truncation have already been dispatched.
    /// - `Io` if the source fails.
    pub fn read_all(&mut self) -> Result<()> {
        self.check_magic()?;

        let mut buffer = [0u8; STAGING_BUFFER_SIZE];
        let mut filled = 0usize;

        loop {
            let n = match self.source.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            filled += n;

            let mut parsed = 0usize;
            while parsed + TYPE_LENGTH_SIZE <= filled {
                let tlv_type = buffer[parsed];
                let length = buffer[parsed + 1] as usize;
                let end = parsed + TYPE_LENGTH_SIZE + length;

                if end > filled {
                    break;
                }

                self.dispatch(tlv_type, &buffer[parsed + TYPE_LENGTH_SIZE..end]);
                parsed = end;
            }

            buffer.copy_within(parsed..filled, 0);
            filled -= parsed;
        }

        if filled > 0 {
            return Err(BtpError::Truncated { remaining: filled });
        }

        Ok(())
    }

    fn check_magic(&mut self) -> Result<()> {
        let mut magic = [0u8; TLV_MAGIC.len()];
        let mut got = 0usize;

        while got < magic.len() {
            match self.source.read(&mut magic[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if got != magic.len() || magic != TLV_MAGIC {
            return Err(BtpError::InvalidMagic);
        }

        Ok(())
    }

    fn dispatch(&mut self, tlv_type: u8, value: &[u8]) {
        let Some(handler) = self.handlers.get_mut(&tlv_type) else {
            tracing::trace!("Skipping unregistered TLV type {}", tlv_type);
            return;
        };

        if let Some(width) = handler.width() {
            if value.len() != width {
                tracing::debug!(
                    "TLV type {} has {} bytes, handler expects {}",
                    tlv_type,
                    value.len(),
                    width
                );
                return;
            }
        }

        match handler {
            TlvHandler::U8(f) => f(tlv_type, value[0]),
            TlvHandler::U16(f) => {
                if let Some(v) = read_u16_be(value) {
                    f(tlv_type, v)
                }
            }
            TlvHandler::U32(f) => {
                if let Some(v) = read_u32_be(value) {
                    f(tlv_type, v)
                }
            }
            TlvHandler::U64(f) => {
                if let Some(v) = read_u64_be(value) {
                    f(tlv_type, v)
                }
            }
            TlvHandler::Str(f) => {
                let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
                f(tlv_type, String::from_utf8_lossy(&value[..end]).into_owned())
            }
        }
    }
}
