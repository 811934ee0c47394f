// Infrastructure layer - Transport, subscriptions and configuration
pub mod config;
pub mod subscriptions;
pub mod transport;
