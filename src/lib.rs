//! # btp-link
//!
//! Reliable segmented transport over a small-MTU, lossy radio link.
//!
//! A link that moves a few hundred bytes per write, and may lose any of
//! them, is turned into an ordered, complete-message channel.
//!
//! ## Architecture
//!
//! - **Transport** ([`protocol`]): stop-and-wait segmentation with per-frame
//!   acks, retransmission on timeout, and reassembly under a size ceiling
//! - **Scheduling** ([`scheduler`], [`queue`], [`pool`]): bounded send
//!   queue, background poll and transmit tasks, deferred handler dispatch
//! - **Payloads** ([`codec`], [`service`], [`config`]): TLV records, typed
//!   services with JSON responses, versioned device settings
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use btp_link::link::{MemoryLink, RadioLink};
//! use btp_link::TransportScheduler;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> btp_link::Result<()> {
//! let (device_link, phone_link) = MemoryLink::pair();
//! let device_link: Arc<dyn RadioLink> = device_link;
//! let phone_link: Arc<dyn RadioLink> = phone_link;
//!
//! let mut device = TransportScheduler::builder().build(device_link);
//! let mut phone = TransportScheduler::builder().build(phone_link);
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! phone.on_data_received(move |data| {
//!     let _ = tx.send(data);
//! });
//!
//! device.start("device")?;
//! phone.start("phone")?;
//!
//! device.send(&[7u8; 500])?;
//! assert_eq!(rx.recv().await.map(|data| data.len()), Some(500));
//!
//! device.stop().await;
//! phone.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod binary;
pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod pool;
pub mod protocol;
pub mod queue;
pub mod scheduler;
pub mod service;
pub mod task;

pub use error::{BtpError, Result};
pub use protocol::{BtpConfig, BtpTransport, TransportEvent};
pub use scheduler::{SchedulerConfig, SendHandle, TransportScheduler, TransportSchedulerBuilder};
pub use service::{ServiceRegistry, ServiceServer};
