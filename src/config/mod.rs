//! Config module - device settings shared across services.
//!
//! - [`AppConfig`] - hotspot and recording settings with TLV persistence
//! - [`TrackedValue`] - versioned snapshot holder the settings live in
//!
//! # Example
//!
//! ```
//! use btp_link::config::{AppConfig, TrackedValue};
//!
//! let settings = TrackedValue::new(AppConfig::default());
//! settings.update(|current| {
//!     let mut next = current.clone();
//!     next.hotspot.enabled = true;
//!     next
//! });
//!
//! let stored = settings.current().to_tlv_bytes();
//! assert!(AppConfig::from_tlv_bytes(&stored).hotspot.enabled);
//! ```

mod app;
mod tracked;

pub use app::{
    AppConfig, HotspotConfig, RecordingConfig, RecordingPlan, DEFAULT_BASE_NAME, DEFAULT_PASSWORD,
    DEFAULT_SINGLE_FILE_DURATION, DEFAULT_SSID, MAX_BASE_NAME_LEN, MAX_PASSWORD_LEN,
    MAX_SCHEDULE_ENTRIES, MAX_SINGLE_FILE_DURATION, MAX_SSID_LEN,
};
pub use tracked::{Snapshot, TrackedValue};
