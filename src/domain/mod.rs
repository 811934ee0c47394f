// Domain layer - Telemetry, connectivity and alert models
pub mod alert;
pub mod connection;
pub mod telemetry;
