// Main entry point - Dependency wiring and a simulated backend driver
mod application;
mod domain;
mod infrastructure;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::session_service::SessionService;
use crate::application::status_backend::StatusBackend;
use crate::domain::telemetry::{StatusFlags, UpsSample};
use crate::infrastructure::config::load_sync_config;
use crate::infrastructure::subscriptions::SubscriptionManager;
use crate::infrastructure::transport::{
    CH_CONNECTED, CH_SAMPLE, CH_SHOW_STATUS, CH_URGENT_ALERT, InMemoryTransport,
};

// Lock helpers everywhere recover from poisoning instead of propagating it;
// a panicking reader must not wedge the sync layer.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Backend stub answering `current_status` from the simulator's last sample.
struct SimulatedBackend {
    last: Arc<Mutex<Option<UpsSample>>>,
}

#[async_trait]
impl StatusBackend for SimulatedBackend {
    async fn current_status(&self) -> anyhow::Result<Option<UpsSample>> {
        Ok(lock(&self.last).clone())
    }
}

fn next_sample(on_battery: bool) -> UpsSample {
    // Drifting but plausible mains/battery readings.
    let jitter = |base: f64, spread: f64| base + (rand::random::<f64>() - 0.5) * spread;
    let input_voltage = if on_battery { 0.0 } else { jitter(230.0, 4.0) };

    UpsSample {
        r#type: "status".to_string(),
        input_voltage,
        fault_voltage: 0.0,
        output_voltage: jitter(229.5, 2.0),
        load_percent: jitter(35.0, 10.0) as u64,
        frequency: jitter(50.0, 0.2),
        battery_voltage: jitter(13.5, 0.2),
        temperature: jitter(28.0, 1.5),
        battery_percent: if on_battery { 94 } else { 100 },
        estimated_runtime: if on_battery { 38 } else { 45 },
        timestamp: Utc::now().to_rfc3339(),
        status: StatusFlags {
            raw: if on_battery { "10000000" } else { "00000000" }.to_string(),
            utility_fail: on_battery,
            ..StatusFlags::default()
        },
    }
}

async fn run_simulator(transport: Arc<InMemoryTransport>, last: Arc<Mutex<Option<UpsSample>>>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut on_battery = false;

    transport.emit(CH_CONNECTED, serde_json::Value::Null);
    loop {
        interval.tick().await;

        if rand::random::<f64>() < 0.03 {
            on_battery = !on_battery;
            if on_battery {
                transport.emit(
                    CH_URGENT_ALERT,
                    serde_json::json!({
                        "title": "Fallo de energia",
                        "message": "El UPS cambio a bateria",
                        "alertType": "warning",
                        "createdAt": Utc::now().to_rfc3339(),
                    }),
                );
            }
        }

        let sample = next_sample(on_battery);
        *lock(&last) = Some(sample.clone());
        match serde_json::to_value(&sample) {
            Ok(value) => transport.emit(CH_SAMPLE, value),
            Err(error) => tracing::error!(%error, "could not encode simulated sample"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = load_sync_config()?;
    tracing::info!(?config, "starting UPS telemetry sync demo");

    let transport = Arc::new(InMemoryTransport::new());
    let last = Arc::new(Mutex::new(None));
    let backend = Arc::new(SimulatedBackend { last: last.clone() });
    let subscriptions = SubscriptionManager::new(transport.clone());

    let service = SessionService::new(backend, subscriptions.clone(), config);
    let session = service.mount();

    // show-status is a pure navigation signal; the sync core ignores it.
    let _nav = subscriptions.subscribe(
        CH_SHOW_STATUS,
        Box::new(|_| tracing::info!("navigate to status view")),
    );

    tokio::spawn(run_simulator(transport, last));

    let mut report = tokio::time::interval(Duration::from_secs(5));
    loop {
        report.tick().await;
        tracing::info!(
            connection = ?session.connection(),
            mode = ?session.power_mode(),
            loading = session.is_loading(),
            chart_points = session.chart_points().len(),
            voltage_points = session.voltage_points().len(),
            alerts = session.alerts().len(),
            banner = ?session.banner(),
            "session snapshot"
        );
    }
}
