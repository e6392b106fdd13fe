//! Frame view with typed accessors.
//!
//! A [`Frame`] borrows its payload from the raw link buffer (inbound) or from
//! the message being sent (outbound). Encoding produces a `bytes::Bytes` that
//! can be retransmitted without re-encoding.
//!
//! # Example
//!
//! ```
//! use btp_link::protocol::Frame;
//!
//! let bytes = Frame::data(0, Some(5), b"hello").encode();
//! let frame = Frame::parse(&bytes).unwrap();
//!
//! assert_eq!(frame.sequence(), 0);
//! assert_eq!(frame.total_length, Some(5));
//! assert_eq!(frame.payload, b"hello");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{FrameHeader, PacketType, EXTRA_HEADER_SIZE, HEADER_SIZE};
use crate::binary::read_u32_be;

/// A single link-layer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Decoded header.
    pub header: FrameHeader,
    /// Total message length, present only on the first Data frame.
    pub total_length: Option<u32>,
    /// Payload bytes.
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Build a Data frame. `total_length` must be set exactly when `sequence == 0`.
    ///
    /// `payload` must fit the single-byte length field.
    pub fn data(sequence: u16, total_length: Option<u32>, payload: &'a [u8]) -> Self {
        debug_assert!(payload.len() <= u8::MAX as usize);
        debug_assert_eq!(sequence == 0, total_length.is_some());
        Self {
            header: FrameHeader::new(sequence, payload.len() as u8, PacketType::Data),
            total_length,
            payload,
        }
    }

    /// Build an Ack frame for `sequence`.
    pub fn ack(sequence: u16) -> Frame<'static> {
        Frame {
            header: FrameHeader::new(sequence, 0, PacketType::Ack),
            total_length: None,
            payload: &[],
        }
    }

    /// Parse a frame from a raw link buffer.
    ///
    /// Returns `None` for noise: a buffer shorter than the header, an unknown
    /// type byte, or a first Data frame too short to carry the total length.
    /// The payload is bounded by both the declared length and the bytes
    /// actually present.
    pub fn parse(raw: &'a [u8]) -> Option<Self> {
        let header = FrameHeader::decode(raw)?;

        if header.packet_type == PacketType::Ack {
            return Some(Self {
                header,
                total_length: None,
                payload: &[],
            });
        }

        let (total_length, start) = if header.sequence == 0 {
            let total = read_u32_be(raw.get(HEADER_SIZE..)?)?;
            (Some(total), HEADER_SIZE + EXTRA_HEADER_SIZE)
        } else {
            (None, HEADER_SIZE)
        };

        let present = raw.len() - start;
        let len = present.min(header.payload_length as usize);

        Some(Self {
            header,
            total_length,
            payload: &raw[start..start + len],
        })
    }

    /// Sequence number.
    #[inline]
    pub fn sequence(&self) -> u16 {
        self.header.sequence
    }

    /// Check if this is an Ack.
    #[inline]
    pub fn is_ack(&self) -> bool {
        self.header.packet_type == PacketType::Ack
    }

    /// Check if this is the first Data frame of a message.
    #[inline]
    pub fn is_first(&self) -> bool {
        self.header.packet_type == PacketType::Data && self.header.sequence == 0
    }

    /// Size of the encoded frame.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        let extension = if self.total_length.is_some() {
            EXTRA_HEADER_SIZE
        } else {
            0
        };
        HEADER_SIZE + extension + self.payload.len()
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Append the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.header.encode());
        if let Some(total) = self.total_length {
            buf.put_u32(total);
        }
        buf.put_slice(self.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_layout() {
        let bytes = Frame::data(0, Some(500), &[0xAA; 3]).encode();

        assert_eq!(
            &bytes[..],
            &[0, 0, 3, 0, 0x00, 0x00, 0x01, 0xF4, 0xAA, 0xAA, 0xAA]
        );
    }

    #[test]
    fn test_continuation_frame_layout() {
        let bytes = Frame::data(2, None, b"xy").encode();
        assert_eq!(&bytes[..], &[0, 2, 2, 0, b'x', b'y']);
    }

    #[test]
    fn test_ack_frame_is_header_only() {
        let bytes = Frame::ack(0x0102).encode();
        assert_eq!(&bytes[..], &[0x01, 0x02, 0, 1]);

        let frame = Frame::parse(&bytes).unwrap();
        assert!(frame.is_ack());
        assert!(!frame.is_first());
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_parse_first_frame() {
        let bytes = Frame::data(0, Some(300), &[1, 2, 3]).encode();
        let frame = Frame::parse(&bytes).unwrap();

        assert!(frame.is_first());
        assert_eq!(frame.total_length, Some(300));
        assert_eq!(frame.payload, &[1, 2, 3]);
    }

    #[test]
    fn test_parse_first_frame_without_extension() {
        // Header claims sequence 0 Data but only 2 extension bytes follow
        assert!(Frame::parse(&[0, 0, 0, 0, 0, 1]).is_none());
        assert!(Frame::parse(&[0, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_parse_clips_to_present_bytes() {
        // Declares 200 payload bytes, carries 2
        let frame = Frame::parse(&[0, 1, 200, 0, 9, 9]).unwrap();
        assert_eq!(frame.payload, &[9, 9]);
    }

    #[test]
    fn test_parse_clips_to_declared_length() {
        // Declares 1 payload byte, carries 3
        let frame = Frame::parse(&[0, 1, 1, 0, 7, 8, 9]).unwrap();
        assert_eq!(frame.payload, &[7]);
    }

    #[test]
    fn test_parse_rejects_noise() {
        assert!(Frame::parse(&[]).is_none());
        assert!(Frame::parse(&[0, 1, 0]).is_none());
        assert!(Frame::parse(&[0, 1, 0, 7]).is_none());
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(Frame::data(0, Some(1), &[0; 222]).encoded_len(), 230);
        assert_eq!(Frame::data(1, None, &[0; 226]).encoded_len(), 230);
        assert_eq!(Frame::ack(1).encoded_len(), 4);
    }
}
