//! # Store Boundary
//!
//! Contracts the core consumes from below: the instance store it sweeps and
//! the checkpoint store that makes progress durable, plus the schema
//! capability table consulted before an operation starts.

pub mod checkpoint_store;
pub mod instance_store;
pub mod schema;

pub use checkpoint_store::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use instance_store::InstanceStore;
pub use schema::{Capability, SchemaVersion, StoreCapabilities};
