//! Transport timing and sizing.

use std::time::Duration;

use super::wire_format::{ChunkLayout, DEFAULT_MTU, MAX_MTU, MIN_MTU};

/// Default time to wait for a frame's ack before retransmitting.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default cumulative budget for sending one message.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default time an inbound message may go without progress.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default sleep between ack checks.
pub const DEFAULT_ACK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default ceiling for a single message, in either direction.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Configuration for a [`BtpTransport`](super::BtpTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtpConfig {
    /// Link MTU, header included.
    pub mtu: usize,
    /// Time to wait for an ack before retransmitting the same frame.
    pub ack_timeout: Duration,
    /// Cumulative budget for one `send`, retransmissions included.
    pub transfer_timeout: Duration,
    /// Inbound message is dropped after this long without a new chunk.
    pub receive_timeout: Duration,
    /// Sleep between ack checks while a frame is outstanding.
    pub ack_poll_interval: Duration,
    /// Largest message accepted for sending or announced by a peer.
    pub max_message_size: usize,
}

impl Default for BtpConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            ack_poll_interval: DEFAULT_ACK_POLL_INTERVAL,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl BtpConfig {
    /// Clamp out-of-range values into a usable configuration.
    pub fn validated(mut self) -> Self {
        if !(MIN_MTU..=MAX_MTU).contains(&self.mtu) {
            let clamped = self.mtu.clamp(MIN_MTU, MAX_MTU);
            tracing::warn!("MTU {} out of range, using {}", self.mtu, clamped);
            self.mtu = clamped;
        }

        if self.ack_poll_interval.is_zero() {
            tracing::warn!("Zero ack poll interval, using default");
            self.ack_poll_interval = DEFAULT_ACK_POLL_INTERVAL;
        }

        if self.max_message_size > u32::MAX as usize {
            self.max_message_size = u32::MAX as usize;
        }

        self
    }

    /// Chunk layout for the configured MTU.
    pub fn layout(&self) -> ChunkLayout {
        ChunkLayout::for_mtu(self.mtu)
    }
}
