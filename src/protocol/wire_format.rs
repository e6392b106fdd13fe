//! Wire format encoding and decoding.
//!
//! Every frame starts with a 4-byte header:
//! ```text
//! ┌──────────┬────────────┬──────┐
//! │ Sequence │ Payload Len│ Type │
//! │ 2 bytes  │ 1 byte     │ 1 B  │
//! │ uint16 BE│            │      │
//! └──────────┴────────────┴──────┘
//! ```
//!
//! The first Data frame of a message (sequence 0) carries a 4-byte
//! big-endian total message length between the header and the payload.

use crate::binary::{read_u16_be, write_u16_be};

/// Header size in bytes (fixed, exactly 4).
pub const HEADER_SIZE: usize = 4;

/// Total-length extension carried by the first Data frame.
pub const EXTRA_HEADER_SIZE: usize = 4;

/// Default link MTU.
pub const DEFAULT_MTU: usize = 230;

/// Default payload capacity of a non-first frame.
pub const DEFAULT_MAX_PAYLOAD: usize = DEFAULT_MTU - HEADER_SIZE;

/// Smallest MTU that still carries one payload byte in the first frame.
pub const MIN_MTU: usize = HEADER_SIZE + EXTRA_HEADER_SIZE + 1;

/// Largest MTU addressable by the single-byte payload length.
pub const MAX_MTU: usize = HEADER_SIZE + u8::MAX as usize;

/// Highest number of frames a single message may span (sequence is a u16).
pub const MAX_CHUNKS: usize = u16::MAX as usize + 1;

/// Frame type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Data = 0,
    Ack = 1,
}

impl TryFrom<u8> for PacketType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Data),
            1 => Ok(PacketType::Ack),
            other => Err(other),
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Chunk index within the message (acks echo the acknowledged index).
    pub sequence: u16,
    /// Declared payload bytes following the header (and extension).
    pub payload_length: u8,
    /// Data or Ack.
    pub packet_type: PacketType,
}

impl FrameHeader {
    /// Create a new header.
    pub fn new(sequence: u16, payload_length: u8, packet_type: PacketType) -> Self {
        Self {
            sequence,
            payload_length,
            packet_type,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use btp_link::protocol::{FrameHeader, PacketType};
    ///
    /// let header = FrameHeader::new(0x0102, 10, PacketType::Data);
    /// assert_eq!(header.encode(), [0x01, 0x02, 10, 0]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (4 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        write_u16_be(buf, self.sequence);
        buf[2] = self.payload_length;
        buf[3] = self.packet_type as u8;
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if the buffer is too short or the type byte is unknown.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            sequence: read_u16_be(buf)?,
            payload_length: buf[2],
            packet_type: PacketType::try_from(buf[3]).ok()?,
        })
    }
}

/// How a message of a given length is cut into frames for one MTU.
///
/// Chunk 0 gives up `EXTRA_HEADER_SIZE` bytes to the total-length extension;
/// every later chunk carries the full `max_payload`. Sender and receiver use
/// the same layout, so offsets line up byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    max_payload: usize,
}

impl ChunkLayout {
    /// Layout for a link MTU. The MTU must lie in `MIN_MTU..=MAX_MTU`.
    pub fn for_mtu(mtu: usize) -> Self {
        debug_assert!((MIN_MTU..=MAX_MTU).contains(&mtu));
        Self {
            max_payload: mtu - HEADER_SIZE,
        }
    }

    /// Payload capacity of a non-first frame.
    #[inline]
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Payload capacity of the first frame.
    #[inline]
    pub fn first_payload(&self) -> usize {
        self.max_payload - EXTRA_HEADER_SIZE
    }

    /// Payload capacity of the frame with this sequence.
    #[inline]
    pub fn capacity(&self, sequence: usize) -> usize {
        if sequence == 0 {
            self.first_payload()
        } else {
            self.max_payload
        }
    }

    /// Byte offset of the chunk with this sequence inside the message.
    #[inline]
    pub fn offset(&self, sequence: usize) -> usize {
        if sequence == 0 {
            0
        } else {
            self.first_payload() + (sequence - 1) * self.max_payload
        }
    }

    /// Number of frames a message of `total` bytes needs.
    pub fn chunk_count(&self, total: usize) -> usize {
        let first = self.first_payload();
        if total == 0 {
            0
        } else if total <= first {
            1
        } else {
            1 + (total - first).div_ceil(self.max_payload)
        }
    }
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self::for_mtu(DEFAULT_MTU)
    }
}
