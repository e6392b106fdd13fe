//! Deferred-closure queue with one dispatch worker.
//!
//! Moves callbacks out of the link's receive path into application context.
//!
//! ```text
//! link callback ─┐
//! link callback ─┼─► pool slot ─► mpsc (bounded) ─► worker ─► job()
//! any thread    ─┘
//! ```
//!
//! Each job occupies one pool slot from enqueue until it has run, so at most
//! `capacity` jobs exist at any time. When the pool is exhausted the new job
//! is dropped and the caller gets an error; producers never block.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{BtpError, Result};
use crate::pool::{ObjectPool, PoolSlot};
use crate::task::ManagedTask;

/// A deferred zero-argument job.
pub type Job = Box<dyn FnOnce() + Send>;

type JobSlot = PoolSlot<Option<Job>>;

/// Default number of job slots.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Cloneable producer side of a [`MessageQueue`].
#[derive(Clone)]
pub struct QueueHandle {
    pool: ObjectPool<Option<Job>>,
    tx: mpsc::Sender<JobSlot>,
}

impl QueueHandle {
    /// Enqueue `job` for the worker.
    ///
    /// # Errors
    ///
    /// - `PoolExhausted` if every slot holds a pending job.
    /// - `QueueFull` if the channel is full.
    /// - `Stopped` if the worker has exited.
    pub fn begin_invoke<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(mut slot) = self.pool.acquire() else {
            tracing::warn!("Message queue exhausted, dropping job");
            return Err(BtpError::PoolExhausted);
        };
        *slot = Some(Box::new(job));

        self.tx.try_send(slot).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!("Message queue full, dropping job");
                BtpError::QueueFull
            }
            TrySendError::Closed(_) => BtpError::Stopped,
        })
    }

    /// Same as [`begin_invoke`](Self::begin_invoke); never blocks or awaits,
    /// so it is usable from driver callbacks and plain threads.
    pub fn begin_invoke_from_isr<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.begin_invoke(job)
    }

    /// Jobs enqueued or running.
    pub fn pending(&self) -> usize {
        self.pool.capacity() - self.pool.available()
    }
}

/// Bounded FIFO of deferred jobs drained by one worker task.
pub struct MessageQueue {
    handle: QueueHandle,
    worker: Option<ManagedTask>,
}

impl MessageQueue {
    /// Create the queue and spawn its worker.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(capacity: usize) -> Self {
        let pool = ObjectPool::new(capacity);
        let (tx, mut rx) = mpsc::channel::<JobSlot>(capacity.max(1));

        let worker = ManagedTask::spawn("message-queue", move |mut stop| async move {
            loop {
                tokio::select! {
                    _ = stop.stopped() => break,
                    slot = rx.recv() => {
                        let Some(mut slot) = slot else { break };
                        if let Some(job) = slot.take() {
                            job();
                        }
                        // slot returns to the pool here
                    }
                }
            }
        });

        Self {
            handle: QueueHandle { pool, tx },
            worker: Some(worker),
        }
    }

    /// Producer handle for other tasks and callbacks.
    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// See [`QueueHandle::begin_invoke`].
    pub fn begin_invoke<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.begin_invoke(job)
    }

    /// See [`QueueHandle::begin_invoke_from_isr`].
    pub fn begin_invoke_from_isr<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.begin_invoke_from_isr(job)
    }

    /// Jobs enqueued or running.
    pub fn pending(&self) -> usize {
        self.handle.pending()
    }

    /// Stop the worker and wait for it. Jobs not yet started are dropped.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop().await;
        }
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_jobs_run_in_fifo_order() {
        let mut queue = MessageQueue::new(10);
        let order = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();

        for i in 0..5 {
            let order = order.clone();
            queue.begin_invoke(move || order.lock().unwrap().push(i)).unwrap();
        }
        queue.begin_invoke(move || {
            let _ = done_tx.send(());
        })
        .unwrap();

        done_rx.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);

        queue.stop().await;
    }

    #[tokio::test]
    async fn test_exhausted_pool_drops_newest() {
        let mut queue = MessageQueue::new(2);
        let ran = Arc::new(Mutex::new(Vec::new()));

        // current-thread runtime: the worker cannot drain until we yield
        let first = ran.clone();
        queue.begin_invoke(move || first.lock().unwrap().push(1)).unwrap();
        let second = ran.clone();
        queue.begin_invoke(move || second.lock().unwrap().push(2)).unwrap();

        let third = ran.clone();
        let result = queue.begin_invoke_from_isr(move || third.lock().unwrap().push(3));
        assert!(matches!(result, Err(BtpError::PoolExhausted)));
        assert_eq!(queue.pending(), 2);

        tokio::time::timeout(Duration::from_secs(1), async {
            while queue.pending() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(*ran.lock().unwrap(), vec![1, 2]);
        queue.begin_invoke(|| {}).unwrap();
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_invoke_from_plain_thread() {
        let mut queue = MessageQueue::new(4);
        let handle = queue.handle();
        let (tx, rx) = oneshot::channel();

        std::thread::spawn(move || {
            handle
                .begin_invoke_from_isr(move || {
                    let _ = tx.send(42);
                })
                .unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_invoke_after_stop_fails() {
        let mut queue = MessageQueue::new(4);
        queue.stop().await;

        let result = queue.begin_invoke(|| {});
        assert!(matches!(result, Err(BtpError::Stopped)));
        assert_eq!(queue.pending(), 0);
    }
}
