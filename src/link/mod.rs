//! Link module - the unreliable, MTU-bounded radio channel.
//!
//! The transport never assumes delivery or ordering from a link:
//! - [`RadioLink`] - best-effort outbound frames plus startup
//! - [`LinkReceiver`] - inbound frames and driver errors, called from the
//!   link's own context (never blocks)
//! - [`MemoryLink`] - in-process link pair with loss injection

mod memory;

pub use memory::MemoryLink;

use std::sync::Weak;

use crate::error::Result;

/// Outbound side of a radio link.
pub trait RadioLink: Send + Sync + 'static {
    /// Start advertising under `name` and route inbound traffic to `receiver`.
    fn begin(&self, name: &str, receiver: Weak<dyn LinkReceiver>) -> Result<()>;

    /// Send one frame. Best effort: the frame may be lost.
    fn transmit(&self, frame: &[u8]);
}

/// Inbound callbacks from a radio link.
pub trait LinkReceiver: Send + Sync + 'static {
    /// A raw frame arrived.
    fn on_link_data(&self, data: &[u8]);

    /// The driver reported an error.
    fn on_link_error(&self, message: &str);
}
