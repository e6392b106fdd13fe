//! Service module - request handling over the transport.
//!
//! Provides:
//! - [`ServiceRegistry`] - maps type codes to services
//! - [`ResponseContext`] - lets services answer with a JSON [`ResponseBody`]
//! - [`ServiceServer`] - dispatches inbound messages from a scheduler
//! - built-in [`SystemInfoService`], [`HotspotService`],
//!   [`CurrentScheduleService`] and [`UpdateScheduleService`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use btp_link::config::{AppConfig, TrackedValue};
//! use btp_link::service::{ResponseContext, ServiceRegistry, ServiceType};
//!
//! let settings = Arc::new(TrackedValue::new(AppConfig::default()));
//! let mut registry = ServiceRegistry::with_builtin(settings);
//!
//! registry.register(9u8, |_: u8, body: &[u8], ctx: &ResponseContext| -> btp_link::Result<()> {
//!     ctx.respond_raw(body)
//! });
//!
//! assert!(registry.get(ServiceType::SystemInfo.into()).is_some());
//! assert_eq!(registry.len(), 5);
//! ```

mod builtin;
mod context;
mod registry;
mod server;

use std::sync::Arc;

pub use builtin::{
    hotspot_fields, schedule_fields, CurrentScheduleService, HotspotService, SystemInfoService,
    UpdateScheduleService,
};
pub use context::{
    ResponseBody, ResponseContext, CODE_INVALID_BODY, CODE_INVALID_ITEM, CODE_MISSING_PARAMETER,
    CODE_OK,
};
pub use registry::{Service, ServiceRegistry, ServiceType, MIN_REQUEST_LEN};
pub use server::ServiceServer;

use crate::config::{AppConfig, TrackedValue};

impl ServiceRegistry {
    /// Registry with every built-in service over `settings`.
    pub fn with_builtin(settings: Arc<TrackedValue<AppConfig>>) -> Self {
        let mut registry = Self::new();
        registry.register(
            ServiceType::SystemInfo,
            SystemInfoService::new(settings.clone()),
        );
        registry.register(
            ServiceType::ConfigureHotspot,
            HotspotService::new(settings.clone()),
        );
        registry.register(
            ServiceType::CurrentSchedule,
            CurrentScheduleService::new(settings.clone()),
        );
        registry.register(ServiceType::UpdateSchedule, UpdateScheduleService::new(settings));
        registry
    }
}
