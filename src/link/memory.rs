//! In-process link pair.
//!
//! Each side delivers transmitted frames synchronously to the receiver
//! attached on the other side. Loss is injected deterministically by
//! dropping every N-th frame a side transmits.
//!
//! # Example
//!
//! ```
//! use btp_link::link::MemoryLink;
//!
//! let (device, phone) = MemoryLink::pair();
//! device.set_drop_every(3);
//! assert_eq!(phone.frames_sent(), 0);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use bytes::Bytes;

use super::{LinkReceiver, RadioLink};
use crate::error::{BtpError, Result};

/// One end of an in-memory link.
pub struct MemoryLink {
    name: Mutex<Option<String>>,
    receiver: Mutex<Option<Weak<dyn LinkReceiver>>>,
    peer: Mutex<Weak<MemoryLink>>,
    drop_every: AtomicUsize,
    sent: AtomicUsize,
    dropped: AtomicUsize,
    recording: AtomicBool,
    recorded: Mutex<Vec<Bytes>>,
    refuse_begin: AtomicBool,
}

impl MemoryLink {
    fn new() -> Self {
        Self {
            name: Mutex::new(None),
            receiver: Mutex::new(None),
            peer: Mutex::new(Weak::new()),
            drop_every: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            recording: AtomicBool::new(false),
            recorded: Mutex::new(Vec::new()),
            refuse_begin: AtomicBool::new(false),
        }
    }

    /// Create two connected ends.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let a = Arc::new(Self::new());
        let b = Arc::new(Self::new());
        *lock(&a.peer) = Arc::downgrade(&b);
        *lock(&b.peer) = Arc::downgrade(&a);
        (a, b)
    }

    /// Drop every `n`-th frame this side transmits (0 disables loss).
    pub fn set_drop_every(&self, n: usize) {
        self.drop_every.store(n, Ordering::Release);
    }

    /// Make the next `begin` calls fail.
    pub fn refuse_begin(&self, refuse: bool) {
        self.refuse_begin.store(refuse, Ordering::Release);
    }

    /// Keep a copy of every transmitted frame, dropped ones included.
    pub fn record_frames(&self, enabled: bool) {
        self.recording.store(enabled, Ordering::Release);
    }

    /// Frames recorded so far.
    pub fn recorded_frames(&self) -> Vec<Bytes> {
        lock(&self.recorded).clone()
    }

    /// Forget recorded frames.
    pub fn clear_recorded(&self) {
        lock(&self.recorded).clear();
    }

    /// Frames handed to `transmit`, dropped ones included.
    pub fn frames_sent(&self) -> usize {
        self.sent.load(Ordering::Acquire)
    }

    /// Frames lost to injected loss.
    pub fn frames_dropped(&self) -> usize {
        self.dropped.load(Ordering::Acquire)
    }

    /// Name passed to the last successful `begin`.
    pub fn name(&self) -> Option<String> {
        lock(&self.name).clone()
    }

    /// Deliver `frame` to this side's receiver as if the peer had sent it.
    pub fn inject(&self, frame: &[u8]) {
        if let Some(receiver) = self.receiver() {
            receiver.on_link_data(frame);
        }
    }

    /// Report a driver error to this side's receiver.
    pub fn raise_error(&self, message: &str) {
        if let Some(receiver) = self.receiver() {
            receiver.on_link_error(message);
        }
    }

    fn receiver(&self) -> Option<Arc<dyn LinkReceiver>> {
        lock(&self.receiver).as_ref().and_then(Weak::upgrade)
    }
}

impl RadioLink for MemoryLink {
    fn begin(&self, name: &str, receiver: Weak<dyn LinkReceiver>) -> Result<()> {
        if self.refuse_begin.load(Ordering::Acquire) {
            return Err(BtpError::LinkInit(format!("link refused to start as {}", name)));
        }

        *lock(&self.name) = Some(name.to_string());
        *lock(&self.receiver) = Some(receiver);
        Ok(())
    }

    fn transmit(&self, frame: &[u8]) {
        let count = self.sent.fetch_add(1, Ordering::AcqRel) + 1;

        if self.recording.load(Ordering::Acquire) {
            lock(&self.recorded).push(Bytes::copy_from_slice(frame));
        }

        let drop_every = self.drop_every.load(Ordering::Acquire);
        if drop_every > 0 && count % drop_every == 0 {
            self.dropped.fetch_add(1, Ordering::AcqRel);
            tracing::trace!("Dropping frame #{} ({} bytes)", count, frame.len());
            return;
        }

        let peer = lock(&self.peer).upgrade();
        if let Some(peer) = peer {
            peer.inject(frame);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
