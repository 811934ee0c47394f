// Connection/session lifecycle - reconciles push channels into one coherent state
use crate::application::alert_queue::{ActiveAlert, AlertQueue};
use crate::application::rolling_buffer::RollingBuffer;
use crate::application::status_backend::StatusBackend;
use crate::domain::connection::{ConnectionState, PowerMode, derive_power_mode};
use crate::domain::telemetry::{ChartPoint, UpsSample, VoltagePoint};
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::subscriptions::{SubscriptionGuard, SubscriptionManager};
use crate::infrastructure::transport::{
    CH_CONNECTED, CH_DISCONNECTED, CH_ERROR, CH_SAMPLE, CH_URGENT_ALERT,
};
use crate::lock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

const DISCONNECTED_BANNER: &str = "UPS disconnected";
const GENERIC_ERROR_BANNER: &str = "UPS error";

/// Everything the session owns. Mutated only from event-handler callbacks
/// and the two startup tasks; consumers read snapshots.
struct SessionState {
    connection: ConnectionState,
    current: Option<UpsSample>,
    loading: bool,
    banner: Option<String>,
    chart: RollingBuffer<ChartPoint>,
    voltage: RollingBuffer<VoltagePoint>,
}

impl SessionState {
    fn new(config: &SyncConfig) -> Self {
        Self {
            connection: ConnectionState::Connecting,
            current: None,
            loading: true,
            banner: None,
            chart: RollingBuffer::new(config.chart_capacity),
            voltage: RollingBuffer::new(config.voltage_capacity),
        }
    }

    fn apply_sample(&mut self, sample: UpsSample) {
        self.loading = false;
        self.connection = ConnectionState::Connected;
        self.banner = None;
        self.chart
            .append(ChartPoint::from(&sample), &sample.timestamp);
        self.voltage
            .append(VoltagePoint::from(&sample), &sample.timestamp);
        self.current = Some(sample);
    }

    fn apply_connected(&mut self) {
        self.loading = false;
        self.connection = ConnectionState::Connected;
        self.banner = None;
    }

    fn apply_error(&mut self, message: String) {
        self.loading = false;
        // Non-fatal: the last-known sample survives a backend error.
        self.connection = ConnectionState::Degraded(message.clone());
        self.banner = Some(message);
    }

    fn apply_disconnected(&mut self) {
        self.loading = false;
        self.connection = ConnectionState::Disconnected;
        self.current = None;
        self.banner = Some(DISCONNECTED_BANNER.to_string());
    }

    // Idempotent; every startup path may call this.
    fn resolve_loading(&mut self) {
        self.loading = false;
    }
}

/// Builds mounted sessions from the backend boundary and the subscription
/// manager.
pub struct SessionService {
    backend: Arc<dyn StatusBackend>,
    subscriptions: Arc<SubscriptionManager>,
    config: SyncConfig,
}

impl SessionService {
    pub fn new(
        backend: Arc<dyn StatusBackend>,
        subscriptions: Arc<SubscriptionManager>,
        config: SyncConfig,
    ) -> Self {
        Self {
            backend,
            subscriptions,
            config,
        }
    }

    /// Mount a session: subscribe to the push channels, fire the initial
    /// status fetch and arm the failsafe timer.
    ///
    /// Whichever of {fetch settles, failsafe fires, push event arrives}
    /// happens first resolves the loading flag; all three are idempotent on
    /// it. The fetch outcome still applies whenever it settles, even after
    /// the failsafe has already ended the loading state.
    pub fn mount(&self) -> SessionHandle {
        let state = Arc::new(Mutex::new(SessionState::new(&self.config)));
        let alerts = AlertQueue::new(
            self.config.alert_capacity,
            Duration::from_secs(self.config.alert_ttl_secs),
        );

        let mut guards = Vec::with_capacity(5);

        let st = state.clone();
        guards.push(self.subscriptions.subscribe(
            CH_SAMPLE,
            Box::new(move |payload| match serde_json::from_value::<UpsSample>(payload) {
                Ok(sample) => lock(&st).apply_sample(sample),
                Err(error) => tracing::warn!(%error, "dropping undecodable sample payload"),
            }),
        ));

        let st = state.clone();
        guards.push(self.subscriptions.subscribe(
            CH_CONNECTED,
            Box::new(move |_| lock(&st).apply_connected()),
        ));

        let st = state.clone();
        guards.push(self.subscriptions.subscribe(
            CH_ERROR,
            Box::new(move |payload| {
                let message = payload
                    .as_str()
                    .unwrap_or(GENERIC_ERROR_BANNER)
                    .to_string();
                lock(&st).apply_error(message);
            }),
        ));

        let st = state.clone();
        guards.push(self.subscriptions.subscribe(
            CH_DISCONNECTED,
            Box::new(move |_| lock(&st).apply_disconnected()),
        ));

        // Independent of the sample stream; wired here so unmount tears it
        // down with the rest.
        let queue = alerts.clone();
        guards.push(self.subscriptions.subscribe(
            CH_URGENT_ALERT,
            Box::new(move |payload| {
                queue.push(payload);
            }),
        ));

        let startup = vec![
            tokio::spawn(run_initial_fetch(self.backend.clone(), state.clone())),
            tokio::spawn(run_failsafe(
                Duration::from_millis(self.config.failsafe_ms),
                state.clone(),
            )),
        ];

        SessionHandle {
            state,
            alerts,
            guards,
            startup,
        }
    }
}

async fn run_initial_fetch(backend: Arc<dyn StatusBackend>, state: Arc<Mutex<SessionState>>) {
    let result = backend.current_status().await;
    let mut session = lock(&state);
    match result {
        Ok(Some(sample)) => session.apply_sample(sample),
        Ok(None) => {
            tracing::debug!("initial status fetch found no device");
            session.apply_disconnected();
        }
        Err(error) => {
            tracing::warn!(%error, "initial status fetch failed");
            session.apply_disconnected();
        }
    }
}

async fn run_failsafe(delay: Duration, state: Arc<Mutex<SessionState>>) {
    tokio::time::sleep(delay).await;
    let mut session = lock(&state);
    if session.loading {
        tracing::debug!("failsafe timer ended the loading state");
    }
    session.resolve_loading();
}

/// A mounted session. All reads are snapshots; `unmount` is the only
/// cancellation trigger.
pub struct SessionHandle {
    state: Arc<Mutex<SessionState>>,
    alerts: AlertQueue,
    guards: Vec<SubscriptionGuard>,
    startup: Vec<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    pub fn connection(&self) -> ConnectionState {
        lock(&self.state).connection.clone()
    }

    pub fn power_mode(&self) -> PowerMode {
        let session = lock(&self.state);
        derive_power_mode(&session.connection, session.current.as_ref())
    }

    pub fn current_sample(&self) -> Option<UpsSample> {
        lock(&self.state).current.clone()
    }

    /// Human-readable error/disconnect condition, if any.
    pub fn banner(&self) -> Option<String> {
        lock(&self.state).banner.clone()
    }

    pub fn chart_points(&self) -> Vec<ChartPoint> {
        lock(&self.state).chart.snapshot()
    }

    pub fn voltage_points(&self) -> Vec<VoltagePoint> {
        lock(&self.state).voltage.snapshot()
    }

    pub fn alerts(&self) -> Vec<ActiveAlert> {
        self.alerts.snapshot()
    }

    pub fn dismiss_alert(&self, id: &str) {
        self.alerts.remove(id);
    }

    // The two charts pause independently, e.g. when one view is hidden.
    pub fn set_chart_paused(&self, paused: bool) {
        lock(&self.state).chart.set_paused(paused);
    }

    pub fn set_voltage_paused(&self, paused: bool) {
        lock(&self.state).voltage.set_paused(paused);
    }

    pub fn clear_charts(&self) {
        let mut session = lock(&self.state);
        session.chart.clear();
        session.voltage.clear();
    }

    /// Cancel the startup tasks and tear down every subscription exactly
    /// once, whether or not its registration has confirmed yet.
    pub fn unmount(self) {
        let Self {
            guards, startup, ..
        } = self;
        for task in &startup {
            task.abort();
        }
        for guard in guards {
            guard.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::sample_at;
    use crate::infrastructure::transport::InMemoryTransport;
    use async_trait::async_trait;

    struct FixedBackend(Option<UpsSample>);

    #[async_trait]
    impl StatusBackend for FixedBackend {
        async fn current_status(&self) -> anyhow::Result<Option<UpsSample>> {
            Ok(self.0.clone())
        }
    }

    struct StalledBackend;

    #[async_trait]
    impl StatusBackend for StalledBackend {
        async fn current_status(&self) -> anyhow::Result<Option<UpsSample>> {
            std::future::pending().await
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl StatusBackend for FailingBackend {
        async fn current_status(&self) -> anyhow::Result<Option<UpsSample>> {
            anyhow::bail!("backend unavailable")
        }
    }

    fn service(
        backend: Arc<dyn StatusBackend>,
        transport: Arc<InMemoryTransport>,
    ) -> SessionService {
        SessionService::new(
            backend,
            SubscriptionManager::new(transport),
            SyncConfig::default(),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn emit_sample(transport: &InMemoryTransport, timestamp: &str) {
        let value = serde_json::to_value(sample_at(timestamp)).unwrap();
        transport.emit(CH_SAMPLE, value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_beats_failsafe_and_connects() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(FixedBackend(Some(sample_at("t0")))), transport).mount();

        settle().await;
        assert!(!session.is_loading());
        assert_eq!(session.connection(), ConnectionState::Connected);
        assert_eq!(session.power_mode(), PowerMode::Online);
        assert_eq!(session.chart_points().len(), 1);

        // Failsafe still fires later; resolving an already-resolved loading
        // flag changes nothing.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!session.is_loading());
        assert_eq!(session.connection(), ConnectionState::Connected);
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failsafe_resolves_loading_without_data() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(StalledBackend), transport.clone()).mount();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(session.is_loading());
        assert_eq!(session.connection(), ConnectionState::Connecting);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!session.is_loading());
        // State is untouched until a push event arrives.
        assert_eq!(session.connection(), ConnectionState::Connecting);
        assert_eq!(session.power_mode(), PowerMode::Offline);

        emit_sample(&transport, "t1");
        settle().await;
        assert_eq!(session.connection(), ConnectionState::Connected);
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_fetch_is_a_disconnect() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(FixedBackend(None)), transport).mount();

        settle().await;
        assert!(!session.is_loading());
        assert_eq!(session.connection(), ConnectionState::Disconnected);
        assert_eq!(session.banner().as_deref(), Some("UPS disconnected"));
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_a_disconnect() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(FailingBackend), transport).mount();

        settle().await;
        assert_eq!(session.connection(), ConnectionState::Disconnected);
        assert!(session.current_sample().is_none());
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_clears_sample_and_goes_offline() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(FixedBackend(Some(sample_at("t0")))), transport.clone()).mount();
        settle().await;
        assert_eq!(session.connection(), ConnectionState::Connected);

        transport.emit(CH_DISCONNECTED, serde_json::Value::Null);
        settle().await;
        assert_eq!(session.connection(), ConnectionState::Disconnected);
        assert!(session.current_sample().is_none());
        assert_eq!(session.power_mode(), PowerMode::Offline);
        assert_eq!(session.banner().as_deref(), Some("UPS disconnected"));
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_degrades_but_keeps_sample() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(FixedBackend(Some(sample_at("t0")))), transport.clone()).mount();
        settle().await;

        transport.emit(CH_ERROR, serde_json::json!("HID read error"));
        settle().await;
        assert_eq!(
            session.connection(),
            ConnectionState::Degraded("HID read error".to_string())
        );
        assert!(session.current_sample().is_some());
        assert_eq!(session.banner().as_deref(), Some("HID read error"));

        // A fresh sample re-enters Connected and clears the banner.
        emit_sample(&transport, "t1");
        settle().await;
        assert_eq!(session.connection(), ConnectionState::Connected);
        assert!(session.banner().is_none());
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_fill_buffers_with_dedupe() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(StalledBackend), transport.clone()).mount();
        settle().await;

        emit_sample(&transport, "t1");
        emit_sample(&transport, "t1");
        emit_sample(&transport, "t2");
        settle().await;

        assert_eq!(session.chart_points().len(), 2);
        assert_eq!(session.voltage_points().len(), 2);
        assert!(!session.is_loading());
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffers_pause_independently() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(StalledBackend), transport.clone()).mount();
        settle().await;

        session.set_chart_paused(true);
        emit_sample(&transport, "t1");
        settle().await;
        assert!(session.chart_points().is_empty());
        assert_eq!(session.voltage_points().len(), 1);

        session.set_chart_paused(false);
        session.set_voltage_paused(true);
        emit_sample(&transport, "t2");
        settle().await;
        assert_eq!(session.chart_points().len(), 1);
        assert_eq!(session.voltage_points().len(), 1);
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_charts_allows_reappending_seen_timestamps() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(StalledBackend), transport.clone()).mount();
        settle().await;

        emit_sample(&transport, "t1");
        settle().await;
        session.clear_charts();
        assert!(session.chart_points().is_empty());
        assert!(session.voltage_points().is_empty());

        emit_sample(&transport, "t1");
        settle().await;
        assert_eq!(session.chart_points().len(), 1);
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_urgent_alerts_flow_into_queue() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(StalledBackend), transport.clone()).mount();
        settle().await;

        transport.emit(CH_URGENT_ALERT, serde_json::json!({ "message": "Fallo de energia" }));
        settle().await;
        let alerts = session.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert.message, "Fallo de energia");

        session.dismiss_alert(&alerts[0].id);
        assert!(session.alerts().is_empty());
        session.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_event_processing() {
        let transport = Arc::new(InMemoryTransport::new());
        let session = service(Arc::new(StalledBackend), transport.clone()).mount();
        settle().await;

        let state = session.state.clone();
        session.unmount();
        settle().await;

        emit_sample(&transport, "t1");
        settle().await;
        let session = lock(&state);
        assert!(session.chart.is_empty());
        assert_eq!(session.connection, ConnectionState::Connecting);
        // Unmount aborted the failsafe; nothing resolves loading anymore.
        assert!(session.loading);
    }
}
