//! Reliable segmented transport over a [`RadioLink`].
//!
//! Outbound messages are cut into frames and sent stop-and-wait: one frame
//! in flight, retransmitted on ack timeout, abandoned once the cumulative
//! transfer budget runs out. Inbound frames are reassembled and delivered
//! whole, exactly once, through the registered event handler.
//!
//! Protocol state lives behind one mutex that is only held while fields
//! change. Link transmissions and event handlers always run after it is
//! released, so a receive callback never waits behind a sender's timeout.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use bytes::Bytes;
use tokio::time::Instant;

use super::config::BtpConfig;
use super::frame::Frame;
use super::reassembly::ReassemblyBuffer;
use super::wire_format::{ChunkLayout, MAX_CHUNKS};
use crate::error::{BtpError, Result};
use crate::link::{LinkReceiver, RadioLink};

/// Outcome reported by the transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete inbound message.
    Delivered(Bytes),
    /// Receive timeout, transfer timeout or link error.
    Error(BtpError),
}

/// Callback receiving transport events.
pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

#[derive(Debug, Default)]
struct ProtocolState {
    awaiting_ack: bool,
    awaiting_sequence: u16,
    reassembly: Option<ReassemblyBuffer>,
    /// Chunk count of the last delivered message, for re-acking late duplicates.
    completed_chunks: Option<usize>,
}

/// Segmented transport endpoint.
pub struct BtpTransport {
    config: BtpConfig,
    layout: ChunkLayout,
    link: Arc<dyn RadioLink>,
    state: Mutex<ProtocolState>,
    send_gate: tokio::sync::Mutex<()>,
    events: RwLock<Option<EventHandler>>,
}

impl BtpTransport {
    /// Create a transport over `link`. The config is clamped if out of range.
    pub fn new(link: Arc<dyn RadioLink>, config: BtpConfig) -> Self {
        let config = config.validated();
        Self {
            layout: config.layout(),
            config,
            link,
            state: Mutex::new(ProtocolState::default()),
            send_gate: tokio::sync::Mutex::new(()),
            events: RwLock::new(None),
        }
    }

    /// Start the link and attach this transport as its receiver.
    pub fn begin(self: &Arc<Self>, name: &str) -> Result<()> {
        let receiver: Weak<Self> = Arc::downgrade(self);
        self.link.begin(name, receiver)?;
        tracing::info!("Link started as `{}`", name);
        Ok(())
    }

    /// Active configuration.
    pub fn config(&self) -> &BtpConfig {
        &self.config
    }

    /// Largest payload `send` accepts.
    pub fn max_send_size(&self) -> usize {
        let addressable = self.layout.offset(MAX_CHUNKS - 1) + self.layout.max_payload();
        self.config.max_message_size.min(addressable)
    }

    /// Register the event handler, replacing any previous one.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        *self.events.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Remove the event handler. Later events are dropped.
    pub fn clear_event_handler(&self) {
        *self.events.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Send one message and wait until every frame is acknowledged.
    ///
    /// Concurrent calls are serialized; only one message is in flight.
    ///
    /// # Errors
    ///
    /// - `EmptyPayload` / `PayloadTooLarge` before anything is transmitted.
    /// - `TransferTimeout` once the cumulative budget is exhausted. The same
    ///   error is also reported as an event.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(BtpError::EmptyPayload);
        }
        let max = self.max_send_size();
        if data.len() > max {
            return Err(BtpError::PayloadTooLarge {
                size: data.len(),
                max,
            });
        }

        let _gate = self.send_gate.lock().await;

        let started = Instant::now();
        let chunks = self.layout.chunk_count(data.len());
        let mut offset = 0usize;

        for index in 0..chunks {
            let sequence = index as u16;
            let end = (offset + self.layout.capacity(index)).min(data.len());
            let total_length = (index == 0).then_some(data.len() as u32);
            let frame = Frame::data(sequence, total_length, &data[offset..end]).encode();

            self.arm_ack(sequence);
            tracing::trace!("TX frame {} ({} bytes)", sequence, frame.len());
            self.link.transmit(&frame);
            self.wait_for_ack(sequence, &frame, started).await?;

            offset = end;
        }

        tracing::debug!("Sent {} bytes in {} frames", data.len(), chunks);
        Ok(())
    }

    /// Handle a raw inbound frame. Malformed frames are dropped silently.
    ///
    /// Frames carry no message id. If every ack of a single-frame message is
    /// lost, each retransmission is a new first frame and the message is
    /// delivered again, so handlers of short messages must be idempotent.
    pub fn receive(&self, raw: &[u8]) {
        let Some(frame) = Frame::parse(raw) else {
            tracing::trace!("Dropping malformed frame ({} bytes)", raw.len());
            return;
        };

        if frame.is_ack() {
            self.process_ack(frame.sequence());
        } else {
            self.process_data(&frame);
        }
    }

    /// Discard an inbound message that made no progress within the receive
    /// timeout and report it. Call periodically.
    pub fn poll(&self) {
        let expired = {
            let mut state = self.lock_state();
            let now = Instant::now();
            let stalled = state
                .reassembly
                .as_ref()
                .is_some_and(|buffer| buffer.is_stalled(now, self.config.receive_timeout));
            if stalled {
                state.reassembly.take()
            } else {
                None
            }
        };

        if let Some(buffer) = expired {
            let error = BtpError::ReceiveTimeout {
                received: buffer.received_bytes(),
                expected: buffer.expected_len(),
            };
            tracing::warn!("{}", error);
            self.emit(TransportEvent::Error(error));
        }
    }

    /// Check whether an outbound frame is waiting for its ack.
    pub fn is_awaiting_ack(&self) -> bool {
        self.lock_state().awaiting_ack
    }

    /// Check whether an inbound message is being reassembled.
    pub fn is_receiving(&self) -> bool {
        self.lock_state().reassembly.is_some()
    }

    async fn wait_for_ack(&self, sequence: u16, frame: &[u8], started: Instant) -> Result<()> {
        let mut awaiting_since = Instant::now();

        loop {
            if !self.is_awaiting(sequence) {
                return Ok(());
            }

            let now = Instant::now();
            let elapsed = now.duration_since(started);
            if elapsed > self.config.transfer_timeout {
                self.lock_state().awaiting_ack = false;

                let elapsed_ms = elapsed.as_millis() as u64;
                tracing::warn!(
                    "Transfer timeout after {} ms waiting for frame {}",
                    elapsed_ms,
                    sequence
                );
                self.emit(TransportEvent::Error(BtpError::TransferTimeout { elapsed_ms }));
                return Err(BtpError::TransferTimeout { elapsed_ms });
            }

            if now.duration_since(awaiting_since) > self.config.ack_timeout {
                tracing::debug!("Ack timeout, retransmitting frame {}", sequence);
                self.link.transmit(frame);
                awaiting_since = Instant::now();
            }

            tokio::time::sleep(self.config.ack_poll_interval).await;
        }
    }

    fn arm_ack(&self, sequence: u16) {
        let mut state = self.lock_state();
        state.awaiting_ack = true;
        state.awaiting_sequence = sequence;
    }

    fn is_awaiting(&self, sequence: u16) -> bool {
        let state = self.lock_state();
        state.awaiting_ack && state.awaiting_sequence == sequence
    }

    fn process_ack(&self, sequence: u16) {
        let mut state = self.lock_state();
        if state.awaiting_ack && state.awaiting_sequence == sequence {
            state.awaiting_ack = false;
        } else {
            tracing::trace!("Ignoring stale ack {}", sequence);
        }
    }

    fn process_data(&self, frame: &Frame<'_>) {
        let sequence = frame.sequence();
        let now = Instant::now();

        let delivered = {
            let mut guard = self.lock_state();
            let state = &mut *guard;

            if let Some(total) = frame.total_length {
                let total = total as usize;
                if total == 0 || total > self.config.max_message_size {
                    tracing::debug!("Dropping first frame announcing {} bytes", total);
                    return;
                }
                if state.reassembly.is_some() {
                    tracing::debug!("New message supersedes incomplete reassembly");
                }
                state.reassembly = Some(ReassemblyBuffer::new(total, self.layout, now));
                state.completed_chunks = None;
            }

            match state.reassembly.as_mut() {
                Some(buffer) => {
                    if !buffer.insert(sequence, frame.payload, now) {
                        tracing::trace!(
                            "Dropping frame {} beyond {} chunks",
                            sequence,
                            buffer.chunk_count()
                        );
                        return;
                    }
                    if buffer.is_complete() {
                        let done = state.reassembly.take();
                        state.completed_chunks = done.as_ref().map(ReassemblyBuffer::chunk_count);
                        done.map(ReassemblyBuffer::into_bytes)
                    } else {
                        None
                    }
                }
                None => match state.completed_chunks {
                    Some(chunks) if (sequence as usize) < chunks => {
                        tracing::trace!("Re-acking frame {} of delivered message", sequence);
                        None
                    }
                    _ => {
                        tracing::trace!("Dropping frame {} with no message in progress", sequence);
                        return;
                    }
                },
            }
        };

        self.link.transmit(&Frame::ack(sequence).header.encode());

        if let Some(message) = delivered {
            tracing::debug!("Delivered {} byte message", message.len());
            self.emit(TransportEvent::Delivered(message));
        }
    }

    fn emit(&self, event: TransportEvent) {
        let handler = self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match handler {
            Some(handler) => handler(event),
            None => tracing::trace!("No event handler, dropping {:?}", event),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ProtocolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LinkReceiver for BtpTransport {
    fn on_link_data(&self, data: &[u8]) {
        self.receive(data);
    }

    fn on_link_error(&self, message: &str) {
        tracing::warn!("Link error: {}", message);
        self.emit(TransportEvent::Error(BtpError::Link(message.to_string())));
    }
}
