// Application layer - Session lifecycle and the buffer/queue primitives
pub mod alert_queue;
pub mod rolling_buffer;
pub mod session_service;
pub mod status_backend;
