//! Background tasks with cooperative stop.
//!
//! A [`ManagedTask`] owns a spawned tokio task and a stop signal. The task
//! body receives a [`StopSignal`] and is expected to check it at every poll
//! boundary; `stop()` raises the signal and joins.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Stop flag observed by a task body.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Check if a stop was requested.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until a stop is requested (or the owner is gone).
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Handle to a spawned background task.
///
/// Dropping the handle requests a stop and aborts the task if it is still
/// running; use [`ManagedTask::stop`] to wait for a clean exit.
pub struct ManagedTask {
    name: String,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ManagedTask {
    /// Spawn `body` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F, Fut>(name: &str, body: F) -> Self
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, rx) = watch::channel(false);
        let handle = tokio::spawn(body(StopSignal { rx }));
        tracing::debug!("Task `{}` started", name);

        Self {
            name: name.to_string(),
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Task name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the task to exit at its next poll boundary.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Check if the task body has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the task to exit. Does not request a stop.
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Task `{}` failed: {}", self.name, e);
            }
            tracing::debug!("Task `{}` exited", self.name);
        }
    }

    /// Request a stop and wait for the task to exit.
    pub async fn stop(mut self) {
        self.request_stop();
        self.join().await;
    }
}

impl Drop for ManagedTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop_tx.send_replace(true);
            if !handle.is_finished() {
                tracing::debug!("Aborting task `{}`", self.name);
                handle.abort();
            }
        }
    }
}
