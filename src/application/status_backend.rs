// Command boundary to the backend process
use crate::domain::telemetry::UpsSample;
use async_trait::async_trait;

/// Request/response side of the backend boundary. Push traffic arrives
/// separately over the event transport.
#[async_trait]
pub trait StatusBackend: Send + Sync {
    /// Fetch the last known device status. `None` means the backend has no
    /// device attached; callers treat failure and `None` identically, as a
    /// disconnect.
    async fn current_status(&self) -> anyhow::Result<Option<UpsSample>>;
}
