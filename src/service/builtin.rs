//! Built-in device services.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use serde_json::json;
use tokio::time::Instant;

use super::context::{CODE_INVALID_BODY, CODE_INVALID_ITEM, CODE_MISSING_PARAMETER};
use super::{ResponseContext, Service};
use crate::codec::{TlvHandler, TlvReader};
use crate::config::{AppConfig, RecordingPlan, TrackedValue, MAX_SCHEDULE_ENTRIES};
use crate::error::Result;

/// Reports uptime, the hotspot settings and the config version.
pub struct SystemInfoService {
    settings: Arc<TrackedValue<AppConfig>>,
    started: Instant,
}

impl SystemInfoService {
    /// Uptime is measured from construction.
    pub fn new(settings: Arc<TrackedValue<AppConfig>>) -> Self {
        Self {
            settings,
            started: Instant::now(),
        }
    }
}

impl Service for SystemInfoService {
    fn handle(&self, _service_type: u8, _body: &[u8], ctx: &ResponseContext) -> Result<()> {
        let snapshot = self.settings.current();
        let data = json!({
            "uptime": self.started.elapsed().as_secs(),
            "hotspot": snapshot.hotspot,
            "configVersion": snapshot.version(),
        });
        ctx.success("Success", data)
    }
}

/// Request body field types of [`HotspotService`].
pub mod hotspot_fields {
    /// u8, 0 or 1. Required.
    pub const ENABLED: u8 = 1;
    /// String. Optional.
    pub const SSID: u8 = 2;
    /// String. Optional.
    pub const PASSWORD: u8 = 3;
}

/// Enables or reconfigures the Wi-Fi hotspot.
///
/// The body is a TLV message; see [`hotspot_fields`].
pub struct HotspotService {
    settings: Arc<TrackedValue<AppConfig>>,
}

impl HotspotService {
    pub fn new(settings: Arc<TrackedValue<AppConfig>>) -> Self {
        Self { settings }
    }
}

impl Service for HotspotService {
    fn handle(&self, _service_type: u8, body: &[u8], ctx: &ResponseContext) -> Result<()> {
        let enabled = Cell::new(None);
        let ssid = RefCell::new(None);
        let password = RefCell::new(None);

        let parsed = {
            let mut reader = TlvReader::from_slice(body);
            reader.register_handler(
                hotspot_fields::ENABLED,
                TlvHandler::u8(|_, v| enabled.set(Some(v != 0))),
            );
            reader.register_handler(
                hotspot_fields::SSID,
                TlvHandler::string(|_, v| *ssid.borrow_mut() = Some(v)),
            );
            reader.register_handler(
                hotspot_fields::PASSWORD,
                TlvHandler::string(|_, v| *password.borrow_mut() = Some(v)),
            );
            reader.read_all()
        };

        if let Err(e) = parsed {
            tracing::debug!("Rejecting hotspot request: {}", e);
            return ctx.failure(CODE_INVALID_BODY, "Invalid request body.");
        }

        let Some(enabled) = enabled.get() else {
            return ctx.failure(CODE_MISSING_PARAMETER, "Missing boolean parameter: `enabled`.");
        };
        let ssid = ssid.into_inner();
        let password = password.into_inner();

        let version = self.settings.update(|current| {
            let mut next = current.clone();
            next.hotspot.enabled = enabled;
            if let Some(ssid) = ssid {
                next.hotspot.ssid = ssid;
            }
            if let Some(password) = password {
                next.hotspot.password = password;
            }
            next
        });
        tracing::info!(
            "Hotspot {} (config version {})",
            if enabled { "enabled" } else { "disabled" },
            version
        );

        ctx.success(
            "Hotspot configuration successfully updated.",
            json!({ "configVersion": version }),
        )
    }
}

/// Returns the recording schedule of the current settings snapshot.
///
/// ```text
/// {"schedule":[{"startTimestamp":1700000000,"duration":900}]}
/// ```
pub struct CurrentScheduleService {
    settings: Arc<TrackedValue<AppConfig>>,
}

impl CurrentScheduleService {
    pub fn new(settings: Arc<TrackedValue<AppConfig>>) -> Self {
        Self { settings }
    }
}

impl Service for CurrentScheduleService {
    fn handle(&self, _service_type: u8, _body: &[u8], ctx: &ResponseContext) -> Result<()> {
        let snapshot = self.settings.current();
        ctx.success("Success", json!({ "schedule": snapshot.recording.schedule }))
    }
}

/// Request body field types of [`UpdateScheduleService`].
///
/// `COUNT` comes first, followed by one `START`, `DURATION` pair per entry.
pub mod schedule_fields {
    /// u8, number of entries. Required, 0 clears the schedule.
    pub const COUNT: u8 = 1;
    /// u64, start as a Unix timestamp.
    pub const START: u8 = 2;
    /// u32, recording length in seconds.
    pub const DURATION: u8 = 3;
}

#[derive(Default)]
struct ScheduleParse {
    pending_start: Option<u64>,
    plans: Vec<RecordingPlan>,
    invalid: bool,
}

impl ScheduleParse {
    fn start(&mut self, start: u64) {
        if self.pending_start.replace(start).is_some() {
            self.invalid = true;
        }
    }

    fn duration(&mut self, duration: u32) {
        match self.pending_start.take() {
            Some(start) if self.plans.len() < MAX_SCHEDULE_ENTRIES => {
                self.plans.push(RecordingPlan {
                    start_timestamp: start as i64,
                    duration,
                });
            }
            _ => self.invalid = true,
        }
    }
}

/// Replaces the recording schedule.
///
/// The body is a TLV message; see [`schedule_fields`]. At most
/// [`MAX_SCHEDULE_ENTRIES`] entries are accepted.
pub struct UpdateScheduleService {
    settings: Arc<TrackedValue<AppConfig>>,
}

impl UpdateScheduleService {
    pub fn new(settings: Arc<TrackedValue<AppConfig>>) -> Self {
        Self { settings }
    }
}

impl Service for UpdateScheduleService {
    fn handle(&self, _service_type: u8, body: &[u8], ctx: &ResponseContext) -> Result<()> {
        let count = Cell::new(None);
        let schedule = RefCell::new(ScheduleParse::default());

        let parsed = {
            let mut reader = TlvReader::from_slice(body);
            reader.register_handler(
                schedule_fields::COUNT,
                TlvHandler::u8(|_, v| count.set(Some(v as usize))),
            );
            reader.register_handler(
                schedule_fields::START,
                TlvHandler::u64(|_, v| schedule.borrow_mut().start(v)),
            );
            reader.register_handler(
                schedule_fields::DURATION,
                TlvHandler::u32(|_, v| schedule.borrow_mut().duration(v)),
            );
            reader.read_all()
        };

        if let Err(e) = parsed {
            tracing::debug!("Rejecting schedule request: {}", e);
            return ctx.failure(CODE_INVALID_BODY, "Invalid request body.");
        }

        let Some(count) = count.get() else {
            return ctx.failure(CODE_MISSING_PARAMETER, "Missing array parameter: `schedule`.");
        };
        let schedule = schedule.into_inner();
        if schedule.invalid || schedule.pending_start.is_some() || schedule.plans.len() != count {
            return ctx.failure(CODE_INVALID_ITEM, "Invalid schedule item.");
        }

        let plans = schedule.plans;
        let entries = plans.len();
        let version = self.settings.update(move |current| {
            let mut next = current.clone();
            next.recording.schedule = plans;
            next
        });
        tracing::info!(
            "Recording schedule set to {} entries (config version {})",
            entries,
            version
        );

        ctx.success(
            "Recording schedule successfully updated.",
            json!({ "configVersion": version }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TlvWriter;
    use crate::service::ResponseBody;
    use std::sync::Mutex;

    fn capture() -> (ResponseContext, Arc<Mutex<Vec<ResponseBody>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = sent.clone();
        let ctx = ResponseContext::with_responder(move |data| {
            sink.lock().unwrap().push(serde_json::from_slice(data).unwrap());
            Ok(())
        });
        (ctx, sent)
    }

    fn settings() -> Arc<TrackedValue<AppConfig>> {
        Arc::new(TrackedValue::new(AppConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_info() {
        let settings = settings();
        let service = SystemInfoService::new(settings.clone());
        let (ctx, sent) = capture();

        tokio::time::advance(std::time::Duration::from_secs(42)).await;
        service.handle(1, &[0, 0], &ctx).unwrap();

        let body = sent.lock().unwrap().remove(0);
        assert!(body.success);
        assert_eq!(body.data["uptime"], 42);
        assert_eq!(body.data["hotspot"]["ssid"], "AMB82-MINI");
        assert_eq!(body.data["configVersion"], 0);
    }

    #[test]
    fn test_hotspot_update() {
        let settings = settings();
        let service = HotspotService::new(settings.clone());
        let (ctx, sent) = capture();

        let mut writer = TlvWriter::new();
        writer.write_u8(hotspot_fields::ENABLED, 1);
        writer.write_str(hotspot_fields::SSID, "field-cam", 12);
        service.handle(2, writer.data(), &ctx).unwrap();

        let body = sent.lock().unwrap().remove(0);
        assert_eq!(body.code, 0);
        assert_eq!(body.data["configVersion"], 1);

        let current = settings.current();
        assert!(current.hotspot.enabled);
        assert_eq!(current.hotspot.ssid, "field-cam");
        assert_eq!(current.hotspot.password, "12345678");
        assert!(current.is_dirty());
    }

    #[test]
    fn test_hotspot_invalid_body() {
        let settings = settings();
        let service = HotspotService::new(settings.clone());
        let (ctx, sent) = capture();

        service.handle(2, b"not tlv", &ctx).unwrap();

        let body = sent.lock().unwrap().remove(0);
        assert!(!body.success);
        assert_eq!(body.code, -1);
        assert_eq!(body.message, "Invalid request body.");
        assert_eq!(settings.current().version(), 0);
    }

    #[test]
    fn test_hotspot_missing_enabled() {
        let settings = settings();
        let service = HotspotService::new(settings.clone());
        let (ctx, sent) = capture();

        let mut writer = TlvWriter::new();
        writer.write_str(hotspot_fields::SSID, "ignored", 12);
        service.handle(2, writer.data(), &ctx).unwrap();

        let body = sent.lock().unwrap().remove(0);
        assert_eq!(body.code, -3);
        assert_eq!(settings.current().hotspot.ssid, "AMB82-MINI");
    }

    #[test]
    fn test_hotspot_wrong_width_enabled_is_missing() {
        let service = HotspotService::new(settings());
        let (ctx, sent) = capture();

        let mut writer = TlvWriter::new();
        writer.write_u16(hotspot_fields::ENABLED, 1);
        service.handle(2, writer.data(), &ctx).unwrap();

        assert_eq!(sent.lock().unwrap()[0].code, -3);
    }

    fn schedule_request(count: u8, entries: &[(u64, u32)]) -> Vec<u8> {
        let mut writer = TlvWriter::new();
        writer.write_u8(schedule_fields::COUNT, count);
        for &(start, duration) in entries {
            writer.write_u64(schedule_fields::START, start);
            writer.write_u32(schedule_fields::DURATION, duration);
        }
        writer.into_bytes()
    }

    #[test]
    fn test_current_schedule() {
        let settings = settings();
        settings.update(|current| {
            let mut next = current.clone();
            next.recording.schedule = vec![RecordingPlan {
                start_timestamp: 1_700_000_000,
                duration: 900,
            }];
            next
        });
        let service = CurrentScheduleService::new(settings);
        let (ctx, sent) = capture();

        service.handle(3, &[0, 0], &ctx).unwrap();

        let body = sent.lock().unwrap().remove(0);
        assert!(body.success);
        assert_eq!(
            body.data,
            json!({ "schedule": [{ "startTimestamp": 1_700_000_000, "duration": 900 }] })
        );
    }

    #[test]
    fn test_current_schedule_empty() {
        let service = CurrentScheduleService::new(settings());
        let (ctx, sent) = capture();

        service.handle(3, &[0, 0], &ctx).unwrap();

        assert_eq!(sent.lock().unwrap()[0].data, json!({ "schedule": [] }));
    }

    #[test]
    fn test_update_schedule() {
        let settings = settings();
        let service = UpdateScheduleService::new(settings.clone());
        let (ctx, sent) = capture();

        let request = schedule_request(2, &[(1_700_000_000, 600), (1_700_086_400, 1200)]);
        service.handle(4, &request, &ctx).unwrap();

        let body = sent.lock().unwrap().remove(0);
        assert_eq!(body.code, 0);
        assert_eq!(body.message, "Recording schedule successfully updated.");
        assert_eq!(body.data["configVersion"], 1);

        let current = settings.current();
        assert_eq!(
            current.recording.schedule,
            vec![
                RecordingPlan {
                    start_timestamp: 1_700_000_000,
                    duration: 600
                },
                RecordingPlan {
                    start_timestamp: 1_700_086_400,
                    duration: 1200
                },
            ]
        );
        assert!(current.is_dirty());
    }

    #[test]
    fn test_update_schedule_clears_with_zero_count() {
        let settings = settings();
        let service = UpdateScheduleService::new(settings.clone());
        let (ctx, sent) = capture();

        service.handle(4, &schedule_request(1, &[(10, 20)]), &ctx).unwrap();
        service.handle(4, &schedule_request(0, &[]), &ctx).unwrap();

        assert!(sent.lock().unwrap().iter().all(|body| body.success));
        assert!(settings.current().recording.schedule.is_empty());
        assert_eq!(settings.current().version(), 2);
    }

    #[test]
    fn test_update_schedule_invalid_body() {
        let settings = settings();
        let service = UpdateScheduleService::new(settings.clone());
        let (ctx, sent) = capture();

        service.handle(4, b"garbage", &ctx).unwrap();

        assert_eq!(sent.lock().unwrap()[0].code, -1);
        assert_eq!(settings.current().version(), 0);
    }

    #[test]
    fn test_update_schedule_missing_count() {
        let settings = settings();
        let service = UpdateScheduleService::new(settings.clone());
        let (ctx, sent) = capture();

        let mut writer = TlvWriter::new();
        writer.write_u64(schedule_fields::START, 10);
        writer.write_u32(schedule_fields::DURATION, 20);
        service.handle(4, writer.data(), &ctx).unwrap();

        let body = sent.lock().unwrap().remove(0);
        assert_eq!(body.code, -3);
        assert_eq!(body.message, "Missing array parameter: `schedule`.");
        assert_eq!(settings.current().version(), 0);
    }

    #[test]
    fn test_update_schedule_invalid_items() {
        let settings = settings();
        let service = UpdateScheduleService::new(settings.clone());
        let (ctx, sent) = capture();

        // count disagrees with the entries
        service.handle(4, &schedule_request(3, &[(10, 20)]), &ctx).unwrap();

        // start without a duration
        let mut writer = TlvWriter::new();
        writer.write_u8(schedule_fields::COUNT, 1);
        writer.write_u64(schedule_fields::START, 10);
        service.handle(4, writer.data(), &ctx).unwrap();

        // duration before any start
        let mut writer = TlvWriter::new();
        writer.write_u8(schedule_fields::COUNT, 1);
        writer.write_u32(schedule_fields::DURATION, 20);
        writer.write_u64(schedule_fields::START, 10);
        service.handle(4, writer.data(), &ctx).unwrap();

        // one entry past the limit
        let entries: Vec<(u64, u32)> = (0..=MAX_SCHEDULE_ENTRIES as u64)
            .map(|i| (i, 60))
            .collect();
        let request = schedule_request(entries.len() as u8, &entries);
        service.handle(4, &request, &ctx).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 4);
        for body in sent.iter() {
            assert_eq!(body.code, -2);
            assert_eq!(body.message, "Invalid schedule item.");
        }
        assert_eq!(settings.current().version(), 0);
    }
}
