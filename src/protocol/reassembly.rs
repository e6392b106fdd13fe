//! Receiver-side staging area for one inbound message.
//!
//! Allocated from the total length announced by the first frame, filled
//! chunk by chunk, and handed out whole once every chunk has arrived.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use super::wire_format::ChunkLayout;

/// Reassembly state for a single message.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    layout: ChunkLayout,
    data: Vec<u8>,
    received: Vec<bool>,
    missing: usize,
    received_bytes: usize,
    last_progress: Instant,
}

impl ReassemblyBuffer {
    /// Allocate a zeroed buffer for a message of `expected_len` bytes.
    pub fn new(expected_len: usize, layout: ChunkLayout, now: Instant) -> Self {
        let chunks = layout.chunk_count(expected_len);
        Self {
            layout,
            data: vec![0; expected_len],
            received: vec![false; chunks],
            missing: chunks,
            received_bytes: 0,
            last_progress: now,
        }
    }

    /// Total message length.
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.data.len()
    }

    /// Number of chunks the message spans.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.received.len()
    }

    /// Bytes stored so far (distinct chunks only).
    #[inline]
    pub fn received_bytes(&self) -> usize {
        self.received_bytes
    }

    /// Store a chunk.
    ///
    /// Returns `false` when `sequence` lies outside the message; nothing is
    /// stored in that case. Copies are clipped to the chunk's slot and to the
    /// end of the buffer. Duplicates overwrite in place.
    pub fn insert(&mut self, sequence: u16, payload: &[u8], now: Instant) -> bool {
        let index = sequence as usize;
        if index >= self.received.len() {
            return false;
        }

        let offset = self.layout.offset(index);
        let room = self.data.len().saturating_sub(offset);
        let len = payload.len().min(room).min(self.layout.capacity(index));
        self.data[offset..offset + len].copy_from_slice(&payload[..len]);

        if !self.received[index] {
            self.received[index] = true;
            self.missing -= 1;
            self.received_bytes += len;
        }

        self.last_progress = now;
        true
    }

    /// Check whether the chunk with this sequence has arrived.
    #[inline]
    pub fn has_chunk(&self, sequence: u16) -> bool {
        self.received
            .get(sequence as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Check whether every chunk has arrived.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }

    /// Check whether no chunk arrived for longer than `timeout`.
    pub fn is_stalled(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_progress) > timeout
    }

    /// Consume the buffer and return the message.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }
}
