// Channel subscription bookkeeping with exactly-once teardown
use crate::infrastructure::transport::EventTransport;
use crate::lock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub type EventHandler = Box<dyn FnMut(Value) + Send>;

struct ActiveSubscription {
    disposed: Arc<AtomicBool>,
    cancel: Arc<Notify>,
}

/// Tracks every live subscription per channel name.
///
/// Registration against the transport confirms asynchronously. A subscription
/// disposed before its registration resolves is torn down at resolution time
/// instead of being activated, so an owner that has already unmounted never
/// leaks a live channel receiver and its handler is never invoked.
pub struct SubscriptionManager {
    transport: Arc<dyn EventTransport>,
    registry: Mutex<HashMap<String, HashMap<u64, ActiveSubscription>>>,
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(transport: Arc<dyn EventTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Subscribe `handler` to `channel`. Several subscriptions may coexist on
    /// the same channel. The returned guard tears the subscription down
    /// exactly once, on `unsubscribe` or drop, and is safe to use before
    /// registration has confirmed.
    pub fn subscribe(self: &Arc<Self>, channel: &str, handler: EventHandler) -> SubscriptionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let disposed = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(Notify::new());

        tokio::spawn(run_subscription(
            self.clone(),
            channel.to_string(),
            id,
            handler,
            disposed.clone(),
            cancel.clone(),
        ));

        SubscriptionGuard {
            manager: self.clone(),
            channel: channel.to_string(),
            id,
            disposed,
            cancel,
        }
    }

    /// Forceful cleanup: dispose every currently registered listener on
    /// `channel` and clear its set. Individual guards touched here become
    /// no-ops afterwards.
    pub fn remove_all(&self, channel: &str) {
        if let Some(entries) = lock(&self.registry).remove(channel) {
            for entry in entries.into_values() {
                entry.disposed.store(true, Ordering::SeqCst);
                entry.cancel.notify_one();
            }
        }
    }

    fn register(&self, channel: &str, id: u64, entry: ActiveSubscription) {
        lock(&self.registry)
            .entry(channel.to_string())
            .or_default()
            .insert(id, entry);
    }

    fn deregister(&self, channel: &str, id: u64) {
        let mut registry = lock(&self.registry);
        if let Some(entries) = registry.get_mut(channel) {
            entries.remove(&id);
            if entries.is_empty() {
                registry.remove(channel);
            }
        }
    }
}

async fn run_subscription(
    manager: Arc<SubscriptionManager>,
    channel: String,
    id: u64,
    mut handler: EventHandler,
    disposed: Arc<AtomicBool>,
    cancel: Arc<Notify>,
) {
    let mut rx = match manager.transport.open_channel(&channel).await {
        Ok(rx) => rx,
        Err(error) => {
            // Treated as "no subscription established"; no retry.
            tracing::warn!(%channel, %error, "channel registration failed");
            return;
        }
    };

    // The owner tore down while registration was pending; dropping the
    // receiver here is the immediate transport-side teardown.
    if disposed.load(Ordering::SeqCst) {
        return;
    }

    manager.register(
        &channel,
        id,
        ActiveSubscription {
            disposed: disposed.clone(),
            cancel: cancel.clone(),
        },
    );

    loop {
        tokio::select! {
            _ = cancel.notified() => break,
            event = rx.recv() => match event {
                Some(payload) if !disposed.load(Ordering::SeqCst) => handler(payload),
                _ => break,
            },
        }
    }

    manager.deregister(&channel, id);
}

/// Teardown capability for one subscription.
pub struct SubscriptionGuard {
    manager: Arc<SubscriptionManager>,
    channel: String,
    id: u64,
    disposed: Arc<AtomicBool>,
    cancel: Arc<Notify>,
}

impl SubscriptionGuard {
    pub fn unsubscribe(self) {
        // Drop performs the teardown.
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.cancel.notify_one();
            self.manager.deregister(&self.channel, self.id);
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.dispose();
    }
}
