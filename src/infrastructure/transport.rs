// Event transport boundary and the in-memory emitter used by the demo and tests
use crate::lock;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

// Channel names pushed by the backend.
pub const CH_SAMPLE: &str = "ups-data";
pub const CH_CONNECTED: &str = "ups-connected";
pub const CH_ERROR: &str = "ups-error";
pub const CH_DISCONNECTED: &str = "ups-disconnected";
pub const CH_URGENT_ALERT: &str = "urgent-alert";
/// Pure UI-navigation signal, consumed outside the sync core.
pub const CH_SHOW_STATUS: &str = "show-status";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("event transport is closed")]
    Closed,
}

/// Push side of the backend boundary. Payloads are opaque JSON values; this
/// layer never owns a wire format.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Register for one channel. Registration confirms asynchronously, so
    /// callers must tolerate teardown happening before this resolves.
    /// Dropping the returned receiver is the transport-side teardown.
    async fn open_channel(
        &self,
        channel: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>, TransportError>;
}

/// Emitter-style transport backed by per-channel fan-out. Delivery order per
/// channel matches emit order.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    channels: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Value>>>>,
    closed: AtomicBool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one payload to every open receiver on `channel`, pruning
    /// receivers that have been torn down.
    pub fn emit(&self, channel: &str, payload: Value) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut channels = lock(&self.channels);
        if let Some(senders) = channels.get_mut(channel) {
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
        }
    }

    /// Refuse further registrations and emissions.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.channels).clear();
    }
}

#[async_trait]
impl EventTransport for InMemoryTransport {
    async fn open_channel(
        &self,
        channel: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.channels)
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
