//! Error types for btp-link.

use thiserror::Error;

/// Main error type for all link, transport and codec operations.
#[derive(Debug, Error)]
pub enum BtpError {
    /// The radio link refused to start.
    #[error("Link initialization failed: {0}")]
    LinkInit(String),

    /// Error reported by the radio driver.
    #[error("Link error: {0}")]
    Link(String),

    /// Cumulative send time exceeded the transfer timeout.
    #[error("Transfer timeout after {elapsed_ms} ms")]
    TransferTimeout { elapsed_ms: u64 },

    /// An inbound message stopped progressing and was discarded.
    #[error("Receive timeout with {received} of {expected} bytes assembled")]
    ReceiveTimeout { received: usize, expected: usize },

    /// Nothing to send.
    #[error("Empty payload")]
    EmptyPayload,

    /// Payload exceeds what a single message can carry.
    #[error("Payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Bounded queue is full.
    #[error("Queue full")]
    QueueFull,

    /// Object pool has no free slot.
    #[error("Pool exhausted")]
    PoolExhausted,

    /// Operation requires a started scheduler.
    #[error("Not started")]
    NotStarted,

    /// Operation raced with shutdown.
    #[error("Stopped")]
    Stopped,

    /// TLV message does not start with the expected preamble.
    #[error("Invalid TLV magic")]
    InvalidMagic,

    /// TLV input ended in the middle of a record.
    #[error("Truncated TLV record ({remaining} bytes left over)")]
    Truncated { remaining: usize },

    /// TLV value does not fit into a single-byte length.
    #[error("TLV value too long: {len} bytes")]
    ValueTooLong { len: usize },

    /// No service is registered for the request's type code.
    #[error("Unknown service type: {0}")]
    UnknownService(u8),

    /// Service request shorter than the minimum request size.
    #[error("Request too short: {len} bytes")]
    RequestTooShort { len: usize },

    /// I/O error from a TLV pull source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (service responses).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using BtpError.
pub type Result<T> = std::result::Result<T, BtpError>;
