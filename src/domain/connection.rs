// Connection state machine and the power mode derived from it
use crate::domain::telemetry::UpsSample;

/// Connectivity as reconciled from the push channels and the initial fetch.
///
/// There is no terminal state; the session re-enters `Connected` or
/// `Disconnected` on later events for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state before any event or fetch result has arrived.
    Connecting,
    /// Samples are flowing.
    Connected,
    /// The backend reported an error but the connection context survives;
    /// the last-known sample is retained.
    Degraded(String),
    /// Explicit disconnect event, or the initial fetch failed or came back
    /// empty.
    Disconnected,
}

impl ConnectionState {
    /// Degraded still counts as connected: the backend reported an error
    /// without dropping the device, and the last sample was kept.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Degraded(_))
    }
}

/// Coarse power source signal shown in the header. Never stored; always
/// recomputed from the current state and latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Offline,
    Battery,
    Online,
}

pub fn derive_power_mode(state: &ConnectionState, sample: Option<&UpsSample>) -> PowerMode {
    if !state.is_connected() {
        return PowerMode::Offline;
    }
    match sample {
        Some(s) if s.status.utility_fail => PowerMode::Battery,
        Some(_) => PowerMode::Online,
        // Connected but no sample yet, e.g. right after ups-connected.
        None => PowerMode::Online,
    }
}
