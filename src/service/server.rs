//! Service server - routes inbound messages to services.

use std::sync::Arc;

use super::{ResponseContext, ServiceRegistry};
use crate::error::Result;
use crate::scheduler::TransportScheduler;

/// Runs a [`ServiceRegistry`] on top of a [`TransportScheduler`].
///
/// Every complete inbound message is one request; responses go back through
/// the same scheduler.
pub struct ServiceServer {
    name: String,
    scheduler: TransportScheduler,
    registry: Arc<ServiceRegistry>,
}

impl ServiceServer {
    /// Create a stopped server advertising as `name`.
    pub fn new(name: &str, scheduler: TransportScheduler, registry: ServiceRegistry) -> Self {
        Self {
            name: name.to_string(),
            scheduler,
            registry: Arc::new(registry),
        }
    }

    /// Start the scheduler and begin dispatching requests.
    ///
    /// # Errors
    ///
    /// `LinkInit` if the link refuses to start.
    pub fn start(&mut self) -> Result<()> {
        self.scheduler.start(&self.name)?;
        let sender = self.scheduler.sender()?;
        let registry = self.registry.clone();

        self.scheduler.on_data_received(move |request| {
            let ctx = ResponseContext::from_sender(sender.clone());
            if let Err(e) = registry.dispatch(&request, &ctx) {
                tracing::warn!("Dropping service request: {}", e);
            }
        });
        self.scheduler.on_error(|e| tracing::warn!("Transport error: {}", e));

        tracing::info!(
            "Service server `{}` started with {} services",
            self.name,
            self.registry.len()
        );
        Ok(())
    }

    /// Stop the scheduler. See [`TransportScheduler::stop`].
    pub async fn stop(&mut self) {
        self.scheduler.stop().await;
    }

    /// The underlying scheduler.
    pub fn scheduler(&self) -> &TransportScheduler {
        &self.scheduler
    }

    /// The registered services.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }
}
