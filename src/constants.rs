//! # System Constants
//!
//! Sentinels and defaults that define the operational boundaries of the
//! batching core.

/// Thread count meaning "run every item of the batch concurrently"
pub const UNBOUNDED_THREAD_COUNT: i32 = -1;

/// Watermarks are assigned starting at one
pub const FIRST_WATERMARK: i64 = 1;

/// Lifecycle events published by the orchestrator
pub mod events {
    pub const OPERATION_STARTED: &str = "operation.started";
    pub const OPERATION_BATCH_COMPLETED: &str = "operation.batch_completed";
    pub const OPERATION_BATCH_FAILED: &str = "operation.batch_failed";
    pub const OPERATION_COMPLETED: &str = "operation.completed";
    pub const OPERATION_FAILED: &str = "operation.failed";
    pub const OPERATION_CANCELED: &str = "operation.canceled";
}

pub mod defaults {
    pub const BATCH_SIZE: u32 = 100;
    pub const MAX_PARALLEL_BATCHES: u32 = 1;
    pub const THREAD_COUNT: i32 = 5;
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BACKOFF_MS: u64 = 1_000;
    pub const MAX_BACKOFF_MS: u64 = 30_000;
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const ITEM_TIMEOUT_MS: u64 = 60_000;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1_000;
    pub const SCHEMA_VERSION: u32 = 4;
}
