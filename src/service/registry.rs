//! Service registry for dispatching requests by type code.
//!
//! A request payload is `[type: u8][body ...]`. The registry maps each type
//! code to one [`Service`].

use std::collections::HashMap;

use super::ResponseContext;
use crate::error::{BtpError, Result};

/// Shortest request accepted for dispatch, type byte included.
pub const MIN_REQUEST_LEN: usize = 3;

/// Built-in service type codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// Uptime, hotspot settings and config version.
    SystemInfo = 1,
    /// Enable or reconfigure the Wi-Fi hotspot.
    ConfigureHotspot = 2,
    /// Read the recording schedule.
    CurrentSchedule = 3,
    /// Replace the recording schedule.
    UpdateSchedule = 4,
}

impl From<ServiceType> for u8 {
    fn from(service_type: ServiceType) -> u8 {
        service_type as u8
    }
}

impl TryFrom<u8> for ServiceType {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, u8> {
        match code {
            1 => Ok(ServiceType::SystemInfo),
            2 => Ok(ServiceType::ConfigureHotspot),
            3 => Ok(ServiceType::CurrentSchedule),
            4 => Ok(ServiceType::UpdateSchedule),
            other => Err(other),
        }
    }
}

/// Trait for request handlers.
///
/// Services run on the scheduler's dispatch worker and must not block.
pub trait Service: Send + Sync + 'static {
    /// Handle one request. `body` excludes the type byte.
    fn handle(&self, service_type: u8, body: &[u8], ctx: &ResponseContext) -> Result<()>;
}

impl<F> Service for F
where
    F: Fn(u8, &[u8], &ResponseContext) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, service_type: u8, body: &[u8], ctx: &ResponseContext) -> Result<()> {
        self(service_type, body, ctx)
    }
}

/// Registry mapping type codes to services.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<u8, Box<dyn Service>>,
}

impl ServiceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` for `service_type`, replacing any previous one.
    pub fn register<S: Service>(&mut self, service_type: impl Into<u8>, service: S) {
        let code = service_type.into();
        if self.services.insert(code, Box::new(service)).is_some() {
            tracing::debug!("Replaced service for type {}", code);
        }
    }

    /// Get a service by type code.
    pub fn get(&self, service_type: u8) -> Option<&dyn Service> {
        self.services.get(&service_type).map(|s| s.as_ref())
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Check if no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Dispatch a request payload to its service.
    ///
    /// # Errors
    ///
    /// - `RequestTooShort` below [`MIN_REQUEST_LEN`] bytes.
    /// - `UnknownService` for an unregistered type code.
    /// - Whatever the service returns.
    pub fn dispatch(&self, payload: &[u8], ctx: &ResponseContext) -> Result<()> {
        if payload.len() < MIN_REQUEST_LEN {
            return Err(BtpError::RequestTooShort { len: payload.len() });
        }

        let service_type = payload[0];
        let service = self
            .get(service_type)
            .ok_or(BtpError::UnknownService(service_type))?;

        tracing::debug!("Dispatching service {} ({} bytes)", service_type, payload.len() - 1);
        service.handle(service_type, &payload[1..], ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_dispatch_by_type() {
        let mut registry = ServiceRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        registry.register(7u8, move |service_type: u8, body: &[u8], _: &ResponseContext| -> Result<()> {
            assert_eq!(service_type, 7);
            assert_eq!(body, b"ab");
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        registry.dispatch(b"\x07ab", &ResponseContext::new()).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_short_request_rejected() {
        let mut registry = ServiceRegistry::new();
        registry.register(ServiceType::SystemInfo, |_: u8, _: &[u8], _: &ResponseContext| -> Result<()> {
            panic!("must not run")
        });

        let result = registry.dispatch(&[1, 0], &ResponseContext::new());
        assert!(matches!(result, Err(BtpError::RequestTooShort { len: 2 })));
    }

    #[test]
    fn test_unknown_type() {
        let registry = ServiceRegistry::new();
        let result = registry.dispatch(&[9, 0, 0], &ResponseContext::new());
        assert!(matches!(result, Err(BtpError::UnknownService(9))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ServiceRegistry::new();
        registry.register(1u8, |_: u8, _: &[u8], _: &ResponseContext| -> Result<()> { Ok(()) });
        registry.register(1u8, |_: u8, _: &[u8], _: &ResponseContext| -> Result<()> {
            Err(BtpError::QueueFull)
        });

        assert_eq!(registry.len(), 1);
        let result = registry.dispatch(&[1, 0, 0], &ResponseContext::new());
        assert!(matches!(result, Err(BtpError::QueueFull)));
    }

    #[test]
    fn test_service_type_codes() {
        assert_eq!(u8::from(ServiceType::SystemInfo), 1);
        assert_eq!(u8::from(ServiceType::ConfigureHotspot), 2);
        assert_eq!(u8::from(ServiceType::UpdateSchedule), 4);
        assert_eq!(ServiceType::try_from(2), Ok(ServiceType::ConfigureHotspot));
        assert_eq!(ServiceType::try_from(3), Ok(ServiceType::CurrentSchedule));
        assert_eq!(ServiceType::try_from(5), Err(5));
        assert_eq!(ServiceType::try_from(0), Err(0));
    }
}
