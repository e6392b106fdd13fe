//! Protocol module - segmented transport over an MTU-bounded link.
//!
//! This module implements the reliable data plane:
//! - 4-byte frame header encoding/decoding and the chunk layout
//! - Frame view with the first-frame total-length extension
//! - Reassembly buffer for inbound messages
//! - [`BtpTransport`]: stop-and-wait sender and reassembling receiver

mod config;
mod frame;
mod reassembly;
mod transport;
mod wire_format;

pub use config::{
    BtpConfig, DEFAULT_ACK_POLL_INTERVAL, DEFAULT_ACK_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_RECEIVE_TIMEOUT, DEFAULT_TRANSFER_TIMEOUT,
};
pub use frame::Frame;
pub use reassembly::ReassemblyBuffer;
pub use transport::{BtpTransport, EventHandler, TransportEvent};
pub use wire_format::{
    ChunkLayout, FrameHeader, PacketType, DEFAULT_MAX_PAYLOAD, DEFAULT_MTU, EXTRA_HEADER_SIZE,
    HEADER_SIZE, MAX_CHUNKS, MAX_MTU, MIN_MTU,
};
