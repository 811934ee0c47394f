use serde::Deserialize;

/// Tunables for the synchronization layer. Defaults match the shipped UI;
/// an optional `config/sync` file overrides them.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on the initial loading state, in milliseconds.
    pub failsafe_ms: u64,
    /// Capacity of the 4-field dashboard chart buffer.
    pub chart_capacity: usize,
    /// Capacity of the voltage-trend buffer.
    pub voltage_capacity: usize,
    /// Maximum number of urgent alerts shown at once.
    pub alert_capacity: usize,
    /// Seconds before an urgent alert expires on its own.
    pub alert_ttl_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            failsafe_ms: 650,
            chart_capacity: 30,
            voltage_capacity: 120,
            alert_capacity: 3,
            alert_ttl_secs: 8,
        }
    }
}

pub fn load_sync_config() -> anyhow::Result<SyncConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/sync").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}
