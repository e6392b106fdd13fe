//! Device settings and their TLV persistence format.
//!
//! | Type          | Field                        | Encoding        |
//! |---------------|------------------------------|-----------------|
//! | 1             | hotspot enabled              | u8 (0 / 1)      |
//! | 2             | hotspot SSID                 | string, max 12  |
//! | 3             | hotspot password             | string, max 8   |
//! | 4             | recording base name          | string, max 12  |
//! | 5             | single file duration (s)     | u32             |
//! | 100 + 2i      | schedule entry i start       | u64 (i64 bits)  |
//! | 101 + 2i      | schedule entry i duration    | u32             |

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::codec::{TlvHandler, TlvReader, TlvWriter};
use crate::error::Result;

/// Default hotspot SSID.
pub const DEFAULT_SSID: &str = "AMB82-MINI";

/// Default hotspot password.
pub const DEFAULT_PASSWORD: &str = "12345678";

/// Default recording file prefix.
pub const DEFAULT_BASE_NAME: &str = "recording";

/// Default length of one recording file, in seconds.
pub const DEFAULT_SINGLE_FILE_DURATION: u32 = 60 * 30;

/// Stored durations above this are replaced by the default.
pub const MAX_SINGLE_FILE_DURATION: u32 = 2048;

/// Schedule entries persisted.
pub const MAX_SCHEDULE_ENTRIES: usize = 8;

/// Stored string limits, in bytes.
pub const MAX_SSID_LEN: usize = 12;
/// See [`MAX_SSID_LEN`].
pub const MAX_PASSWORD_LEN: usize = 8;
/// See [`MAX_SSID_LEN`].
pub const MAX_BASE_NAME_LEN: usize = 12;

const TYPE_HOTSPOT_ENABLED: u8 = 1;
const TYPE_HOTSPOT_SSID: u8 = 2;
const TYPE_HOTSPOT_PASSWORD: u8 = 3;
const TYPE_BASE_NAME: u8 = 4;
const TYPE_SINGLE_FILE_DURATION: u8 = 5;
const TYPE_SCHEDULE_BASE: u8 = 100;

fn schedule_start_type(index: usize) -> u8 {
    TYPE_SCHEDULE_BASE + (index * 2) as u8
}

fn schedule_duration_type(index: usize) -> u8 {
    schedule_start_type(index) + 1
}

/// Wi-Fi access point settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotConfig {
    pub enabled: bool,
    pub ssid: String,
    pub password: String,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ssid: DEFAULT_SSID.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// One scheduled recording window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPlan {
    /// Unix timestamp, seconds.
    pub start_timestamp: i64,
    /// Seconds.
    pub duration: u32,
}

/// Recording settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    pub base_name: String,
    pub single_file_duration: u32,
    pub schedule: Vec<RecordingPlan>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            base_name: DEFAULT_BASE_NAME.to_string(),
            single_file_duration: DEFAULT_SINGLE_FILE_DURATION,
            schedule: Vec::new(),
        }
    }
}

/// Device-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub hotspot: HotspotConfig,
    pub recording: RecordingConfig,
}

impl AppConfig {
    /// Append every field to `writer`. Strings are truncated to their limits
    /// and only the first [`MAX_SCHEDULE_ENTRIES`] schedule entries are kept.
    pub fn write_tlv(&self, writer: &mut TlvWriter) {
        writer.write_u8(TYPE_HOTSPOT_ENABLED, u8::from(self.hotspot.enabled));
        writer.write_str(TYPE_HOTSPOT_SSID, &self.hotspot.ssid, MAX_SSID_LEN);
        writer.write_str(TYPE_HOTSPOT_PASSWORD, &self.hotspot.password, MAX_PASSWORD_LEN);

        writer.write_str(TYPE_BASE_NAME, &self.recording.base_name, MAX_BASE_NAME_LEN);
        writer.write_u32(TYPE_SINGLE_FILE_DURATION, self.recording.single_file_duration);

        for (i, plan) in self
            .recording
            .schedule
            .iter()
            .take(MAX_SCHEDULE_ENTRIES)
            .enumerate()
        {
            writer.write_u64(schedule_start_type(i), plan.start_timestamp as u64);
            writer.write_u32(schedule_duration_type(i), plan.duration);
        }
    }

    /// Encode into a fresh TLV message.
    pub fn to_tlv_bytes(&self) -> Vec<u8> {
        let mut writer = TlvWriter::with_capacity(128);
        self.write_tlv(&mut writer);
        writer.into_bytes()
    }

    /// Decode a TLV message, falling back to defaults if it is unreadable.
    pub fn from_tlv_bytes(buffer: &[u8]) -> Self {
        match Self::try_from_tlv(buffer) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Stored config unreadable ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Decode a TLV message. Fields that are absent keep their defaults.
    ///
    /// # Errors
    ///
    /// Any codec error from [`TlvReader::read_all`].
    pub fn try_from_tlv(buffer: &[u8]) -> Result<Self> {
        let config = RefCell::new(Self::default());

        {
            let mut reader = TlvReader::from_slice(buffer);

            reader.register_handler(
                TYPE_HOTSPOT_ENABLED,
                TlvHandler::u8(|_, v| config.borrow_mut().hotspot.enabled = v != 0),
            );
            reader.register_handler(
                TYPE_HOTSPOT_SSID,
                TlvHandler::string(|_, v| config.borrow_mut().hotspot.ssid = v),
            );
            reader.register_handler(
                TYPE_HOTSPOT_PASSWORD,
                TlvHandler::string(|_, v| config.borrow_mut().hotspot.password = v),
            );
            reader.register_handler(
                TYPE_BASE_NAME,
                TlvHandler::string(|_, v| config.borrow_mut().recording.base_name = v),
            );
            reader.register_handler(
                TYPE_SINGLE_FILE_DURATION,
                TlvHandler::u32(|_, v| {
                    let duration = if v > MAX_SINGLE_FILE_DURATION {
                        tracing::warn!(
                            "Invalid single file duration {}, using {}",
                            v,
                            DEFAULT_SINGLE_FILE_DURATION
                        );
                        DEFAULT_SINGLE_FILE_DURATION
                    } else {
                        v
                    };
                    config.borrow_mut().recording.single_file_duration = duration;
                }),
            );

            for i in 0..MAX_SCHEDULE_ENTRIES {
                let config = &config;
                reader.register_handler(
                    schedule_start_type(i),
                    TlvHandler::u64(move |_, v| {
                        plan_at(&mut config.borrow_mut(), i).start_timestamp = v as i64;
                    }),
                );
                reader.register_handler(
                    schedule_duration_type(i),
                    TlvHandler::u32(move |_, v| {
                        plan_at(&mut config.borrow_mut(), i).duration = v;
                    }),
                );
            }

            reader.read_all()?;
        }

        Ok(config.into_inner())
    }
}

// entries may arrive in any order; the schedule only grows
fn plan_at(config: &mut AppConfig, index: usize) -> &mut RecordingPlan {
    let schedule = &mut config.recording.schedule;
    if schedule.len() <= index {
        schedule.resize(index + 1, RecordingPlan::default());
    }
    &mut schedule[index]
}
