// Bounded urgent-alert queue with per-entry TTL expiry
use crate::domain::alert::UrgentAlert;
use crate::lock;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An alert currently on screen, addressable by the id assigned at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAlert {
    pub id: String,
    pub alert: UrgentAlert,
}

/// Transient queue of urgent alerts, newest first.
///
/// Two evictions compete on the same collection: pushing past capacity drops
/// the oldest entry immediately, and each entry's TTL timer removes that
/// entry by id once it elapses. Both are remove-if-present by identity, so a
/// timer firing after a capacity eviction is harmless.
#[derive(Debug, Clone)]
pub struct AlertQueue {
    entries: Arc<Mutex<Vec<ActiveAlert>>>,
    capacity: usize,
    ttl: Duration,
}

impl AlertQueue {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            capacity,
            ttl,
        }
    }

    /// Ingest one raw channel payload: sanitize, assign an id, prepend,
    /// truncate to capacity and arm the expiry timer. Returns the id.
    pub fn push(&self, payload: serde_json::Value) -> String {
        let alert = UrgentAlert::from_value(payload);
        let id = next_alert_id();

        let mut entries = lock(&self.entries);
        entries.insert(
            0,
            ActiveAlert {
                id: id.clone(),
                alert,
            },
        );
        entries.truncate(self.capacity);
        drop(entries);

        let entries = self.entries.clone();
        let expired = id.clone();
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            remove_entry(&entries, &expired);
        });

        id
    }

    /// Remove by id; no-op if the entry was already evicted.
    pub fn remove(&self, id: &str) {
        remove_entry(&self.entries, id);
    }

    /// Snapshot, newest first.
    pub fn snapshot(&self) -> Vec<ActiveAlert> {
        lock(&self.entries).clone()
    }
}

fn remove_entry(entries: &Mutex<Vec<ActiveAlert>>, id: &str) {
    lock(entries).retain(|entry| entry.id != id);
}

// Uniqueness only has to hold within the TTL window, so a millisecond prefix
// plus a random suffix is enough.
fn next_alert_id() -> String {
    format!(
        "{}-{:04x}",
        Utc::now().timestamp_millis(),
        rand::random::<u16>()
    )
}
