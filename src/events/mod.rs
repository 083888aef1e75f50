//! # Lifecycle Events
//!
//! Broadcast channel carrying operation progress for observers such as a
//! status cache or a telemetry bridge.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};
