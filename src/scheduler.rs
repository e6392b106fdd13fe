//! Transport scheduler - the upward send / on-data-received facade.
//!
//! The [`TransportSchedulerBuilder`] collects protocol and scheduling
//! settings. A started [`TransportScheduler`] runs:
//! 1. a receive-poll task calling [`BtpTransport::poll`] on a fixed cadence
//! 2. a transmit task draining the bounded send queue, one message at a time
//! 3. a [`MessageQueue`] worker that runs the application handlers, so the
//!    link's receive path never executes application code
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use btp_link::link::{MemoryLink, RadioLink};
//! use btp_link::scheduler::TransportScheduler;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> btp_link::Result<()> {
//! let (device, _phone) = MemoryLink::pair();
//! let link: Arc<dyn RadioLink> = device;
//!
//! let mut scheduler = TransportScheduler::builder()
//!     .mtu(230)
//!     .send_queue_depth(8)
//!     .build(link);
//!
//! scheduler.on_data_received(|data| println!("got {} bytes", data.len()));
//! scheduler.start("AMB82-MINI")?;
//! scheduler.send(b"hello")?;
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{BtpError, Result};
use crate::link::RadioLink;
use crate::pool::{ObjectPool, PoolSlot};
use crate::protocol::{BtpConfig, BtpTransport, TransportEvent};
use crate::queue::{MessageQueue, QueueHandle, DEFAULT_QUEUE_CAPACITY};
use crate::task::ManagedTask;

/// Default number of outbound message buffers.
pub const DEFAULT_POOL_CAPACITY: usize = 10;

/// Default depth of the outbound send queue.
pub const DEFAULT_SEND_QUEUE_DEPTH: usize = 8;

/// Default cadence of the receive-timeout poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Scheduling settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Outbound message buffers (queued plus in flight).
    pub pool_capacity: usize,
    /// Messages waiting for the transmit task.
    pub send_queue_depth: usize,
    /// Pending application callbacks.
    pub dispatch_queue_capacity: usize,
    /// Receive-poll cadence.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            send_queue_depth: DEFAULT_SEND_QUEUE_DEPTH,
            dispatch_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    /// Replace values the background tasks cannot run with.
    pub fn validated(mut self) -> Self {
        if self.poll_interval.is_zero() {
            tracing::warn!("Zero receive-poll interval, using default");
            self.poll_interval = DEFAULT_POLL_INTERVAL;
        }
        self
    }
}

/// Builder for a [`TransportScheduler`] and its transport.
#[derive(Debug, Clone, Default)]
pub struct TransportSchedulerBuilder {
    btp: BtpConfig,
    scheduler: SchedulerConfig,
}

impl TransportSchedulerBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all protocol settings.
    pub fn btp_config(mut self, config: BtpConfig) -> Self {
        self.btp = config;
        self
    }

    /// Replace all scheduling settings.
    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    /// Set the link MTU.
    ///
    /// Default: 230
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.btp.mtu = mtu;
        self
    }

    /// Set the per-frame retransmission timeout.
    ///
    /// Default: 1 second
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.btp.ack_timeout = timeout;
        self
    }

    /// Set the cumulative per-message send budget.
    ///
    /// Default: 10 seconds
    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.btp.transfer_timeout = timeout;
        self
    }

    /// Set how long an inbound message may stall before it is discarded.
    ///
    /// Default: 5 seconds
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.btp.receive_timeout = timeout;
        self
    }

    /// Set the sleep between ack checks while sending.
    ///
    /// Default: 5 ms
    pub fn ack_poll_interval(mut self, interval: Duration) -> Self {
        self.btp.ack_poll_interval = interval;
        self
    }

    /// Set the largest message either side accepts.
    ///
    /// Default: 64 KiB
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.btp.max_message_size = size;
        self
    }

    /// Set the number of outbound message buffers.
    ///
    /// Default: 10
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.scheduler.pool_capacity = capacity;
        self
    }

    /// Set the send queue depth.
    ///
    /// Default: 8
    pub fn send_queue_depth(mut self, depth: usize) -> Self {
        self.scheduler.send_queue_depth = depth;
        self
    }

    /// Set the number of pending application callbacks.
    ///
    /// Default: 10
    pub fn dispatch_queue_capacity(mut self, capacity: usize) -> Self {
        self.scheduler.dispatch_queue_capacity = capacity;
        self
    }

    /// Set the receive-poll cadence.
    ///
    /// Default: 50 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.scheduler.poll_interval = interval;
        self
    }

    /// Build a transport over `link` and wrap it in a stopped scheduler.
    pub fn build(self, link: Arc<dyn RadioLink>) -> TransportScheduler {
        let transport = Arc::new(BtpTransport::new(link, self.btp));
        TransportScheduler::new(transport, self.scheduler)
    }
}

type DataHandler = Arc<dyn Fn(Bytes) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(BtpError) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    data: RwLock<Option<DataHandler>>,
    error: RwLock<Option<ErrorHandler>>,
}

impl Handlers {
    fn deliver(&self, data: Bytes) {
        let handler = self.data.read().unwrap_or_else(PoisonError::into_inner).clone();
        match handler {
            Some(handler) => handler(data),
            None => tracing::debug!("No data handler, dropping {} bytes", data.len()),
        }
    }

    fn fail(&self, error: BtpError) {
        let handler = self.error.read().unwrap_or_else(PoisonError::into_inner).clone();
        match handler {
            Some(handler) => handler(error),
            None => tracing::debug!("No error handler, dropping: {}", error),
        }
    }
}

/// Cloneable handle for enqueueing outbound messages.
#[derive(Clone)]
pub struct SendHandle {
    pool: ObjectPool<Vec<u8>>,
    tx: mpsc::Sender<PoolSlot<Vec<u8>>>,
    max_size: usize,
}

impl SendHandle {
    /// Copy `data` into a pooled buffer and queue it for transmission.
    ///
    /// Never blocks. Success means the message was queued, not delivered;
    /// transfer failures are reported to the error handler.
    ///
    /// # Errors
    ///
    /// - `EmptyPayload` / `PayloadTooLarge` for unsendable input.
    /// - `PoolExhausted` / `QueueFull` when the send path is saturated.
    /// - `Stopped` after the scheduler has stopped.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(BtpError::EmptyPayload);
        }
        if data.len() > self.max_size {
            return Err(BtpError::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let Some(mut slot) = self.pool.acquire() else {
            tracing::warn!("Send pool exhausted, dropping {} byte message", data.len());
            return Err(BtpError::PoolExhausted);
        };
        slot.clear();
        slot.extend_from_slice(data);

        self.tx.try_send(slot).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!("Send queue full, dropping {} byte message", data.len());
                BtpError::QueueFull
            }
            TrySendError::Closed(_) => BtpError::Stopped,
        })
    }
}

struct Running {
    sender: SendHandle,
    rx_task: ManagedTask,
    tx_task: ManagedTask,
    dispatch: MessageQueue,
}

/// Runs a [`BtpTransport`] behind a bounded send queue and background tasks.
pub struct TransportScheduler {
    transport: Arc<BtpTransport>,
    config: SchedulerConfig,
    handlers: Arc<Handlers>,
    running: Option<Running>,
}

impl TransportScheduler {
    /// Create a builder with default settings.
    pub fn builder() -> TransportSchedulerBuilder {
        TransportSchedulerBuilder::new()
    }

    /// Wrap an existing transport. Nothing runs until [`start`](Self::start).
    ///
    /// A zero poll interval is replaced by the default.
    pub fn new(transport: Arc<BtpTransport>, config: SchedulerConfig) -> Self {
        Self {
            transport,
            config: config.validated(),
            handlers: Arc::new(Handlers::default()),
            running: None,
        }
    }

    /// Start the link as `name` and spawn the background tasks.
    ///
    /// Calling `start` on a running scheduler does nothing.
    ///
    /// # Errors
    ///
    /// `LinkInit` if the link refuses to start; no task is left running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&mut self, name: &str) -> Result<()> {
        if self.running.is_some() {
            tracing::debug!("Scheduler already running");
            return Ok(());
        }

        // Handlers are wired before the link can deliver anything
        let dispatch = MessageQueue::new(self.config.dispatch_queue_capacity);
        let queue = dispatch.handle();
        let handlers = self.handlers.clone();
        self.transport
            .on_event(move |event| forward_event(&queue, &handlers, event));

        if let Err(e) = self.transport.begin(name) {
            tracing::error!("Failed to start link: {}", e);
            self.transport.clear_event_handler();
            return Err(e);
        }

        let pool = ObjectPool::with_init(self.config.pool_capacity, Vec::new);
        let (tx, rx) = mpsc::channel(self.config.send_queue_depth.max(1));
        let sender = SendHandle {
            pool,
            tx,
            max_size: self.transport.max_send_size(),
        };

        let rx_task = spawn_poll_task(self.transport.clone(), self.config.poll_interval);
        let tx_task = spawn_transmit_task(self.transport.clone(), rx);

        self.running = Some(Running {
            sender,
            rx_task,
            tx_task,
            dispatch,
        });
        tracing::info!("Scheduler started as `{}`", name);
        Ok(())
    }

    /// Queue `data` for transmission. See [`SendHandle::send`].
    ///
    /// # Errors
    ///
    /// `NotStarted` before [`start`](Self::start), otherwise as
    /// [`SendHandle::send`].
    pub fn send(&self, data: &[u8]) -> Result<()> {
        match &self.running {
            Some(running) => running.sender.send(data),
            None => Err(BtpError::NotStarted),
        }
    }

    /// A cloneable send handle for services and other tasks.
    ///
    /// # Errors
    ///
    /// `NotStarted` before [`start`](Self::start).
    pub fn sender(&self) -> Result<SendHandle> {
        self.running
            .as_ref()
            .map(|running| running.sender.clone())
            .ok_or(BtpError::NotStarted)
    }

    /// Register the handler for complete inbound messages.
    ///
    /// Runs on the dispatch worker, never on the link's receive path.
    /// A single-frame message whose acks are all lost can arrive more than
    /// once; see [`BtpTransport::receive`].
    pub fn on_data_received<F>(&self, handler: F)
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        *self
            .handlers
            .data
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Register the handler for transfer, receive and link errors.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(BtpError) + Send + Sync + 'static,
    {
        *self
            .handlers
            .error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Stop both tasks, wait for them, then stop the dispatch worker.
    ///
    /// A message being transmitted is abandoned; queued messages are dropped.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let Running {
            sender,
            rx_task,
            tx_task,
            mut dispatch,
        } = running;
        drop(sender);

        rx_task.request_stop();
        tx_task.request_stop();
        rx_task.stop().await;
        tx_task.stop().await;

        self.transport.clear_event_handler();
        dispatch.stop().await;
        tracing::info!("Scheduler stopped");
    }

    /// Check if the background tasks are running.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<BtpTransport> {
        &self.transport
    }

    /// Active scheduling settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl Drop for TransportScheduler {
    fn drop(&mut self) {
        // Tasks abort when their handles drop; events stop here
        if self.running.is_some() {
            self.transport.clear_event_handler();
        }
    }
}

fn forward_event(queue: &QueueHandle, handlers: &Arc<Handlers>, event: TransportEvent) {
    let handlers = handlers.clone();
    let result = match event {
        TransportEvent::Delivered(data) => {
            queue.begin_invoke_from_isr(move || handlers.deliver(data))
        }
        TransportEvent::Error(error) => queue.begin_invoke_from_isr(move || handlers.fail(error)),
    };

    if let Err(e) = result {
        tracing::debug!("Transport event not dispatched: {}", e);
    }
}

fn spawn_poll_task(transport: Arc<BtpTransport>, interval: Duration) -> ManagedTask {
    ManagedTask::spawn("btp-rx-poll", move |mut stop| async move {
        loop {
            tokio::select! {
                _ = stop.stopped() => break,
                _ = tokio::time::sleep(interval) => transport.poll(),
            }
        }
    })
}

fn spawn_transmit_task(
    transport: Arc<BtpTransport>,
    mut rx: mpsc::Receiver<PoolSlot<Vec<u8>>>,
) -> ManagedTask {
    ManagedTask::spawn("btp-tx", move |mut stop| async move {
        loop {
            let message = tokio::select! {
                _ = stop.stopped() => break,
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            tokio::select! {
                _ = stop.stopped() => break,
                result = transport.send(&message[..]) => {
                    if let Err(e) = result {
                        tracing::warn!("Dropping {} byte message: {}", message.len(), e);
                    }
                }
            }
            // buffer returns to the pool here
        }
    })
}
