//! Streaming Response Coordinator and the reply event protocol.

pub mod coordinator;
pub mod events;

pub use coordinator::StreamCoordinator;
