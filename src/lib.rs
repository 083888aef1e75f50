#![allow(clippy::doc_markdown)] // Allow technical terms like DICOM, UIDs in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # DICOM Operations Core
//!
//! Resumable, checkpointed background operations over the instance
//! watermark sequence of a DICOM store.
//!
//! ## Overview
//!
//! Every stored instance receives a monotonically increasing watermark.
//! Bulk operations (reindex, duplicate, migration, data cleanup, content
//! length backfill, export) sweep that sequence oldest first: the range is
//! cut into batches, each batch is fanned out to an idempotent per-instance
//! processor with bounded concurrency, and the checkpoint advances only once
//! a batch is confirmed. A crashed or failed sweep resumes from its last
//! checkpoint without reprocessing or skipping watermarks.
//!
//! ## Module Organization
//!
//! - [`models`] - Watermark ranges, checkpoints, operation inputs
//! - [`orchestration`] - Batch planner, wave executor, retry policy, orchestrator
//! - [`client`] - Start / status / cancel / resume boundary
//! - [`store`] - Instance store and checkpoint store contracts
//! - [`registry`] - Per-operation-type item processors
//! - [`state_machine`] - Operation status transitions
//! - [`events`] - Lifecycle event broadcast
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use dicom_operations::models::WatermarkRange;
//! use dicom_operations::orchestration::BatchPlanner;
//!
//! let total = WatermarkRange::new(1, 10).unwrap();
//! let batches = BatchPlanner::plan(total, 3, 8).unwrap();
//! assert_eq!(batches.len(), 4);
//! assert_eq!(batches[3], WatermarkRange::single(10));
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod store;

pub use client::{OperationClient, OperationStatusReport};
pub use config::{BatchingConfig, ConfigLoader, OperationsConfig, RetryConfig};
pub use error::{OperationError, OperationResult};
pub use events::{EventPublisher, PublishedEvent};
pub use models::{
    Batch, InstanceFilter, InstanceIdentifier, OperationCheckpoint, OperationId, OperationInput,
    OperationType, WatermarkRange,
};
pub use orchestration::{
    BatchOrchestrator, BatchPlanner, OrchestrationOutcome, RetryPolicy, TaskBatch,
};
pub use registry::{ItemProcessor, ProcessorRegistry};
pub use state_machine::{CheckpointState, OperationEvent, OperationStatus};
pub use store::{CheckpointStore, InstanceStore, SchemaVersion};
