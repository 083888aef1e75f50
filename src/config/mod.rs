//! # Operation Configuration
//!
//! Batching, retry, execution and logging settings for watermark sweeps.
//! Values come from `config/default.toml`, an optional per-environment file
//! and `DICOM_OPS__*` environment variables, in that order.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dicom_operations::config::ConfigLoader;
//! use dicom_operations::models::OperationType;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let reindex_batching = config.batching_for(OperationType::Reindex);
//! println!("reindex batch size: {}", reindex_batching.batch_size);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, UNBOUNDED_THREAD_COUNT};
use crate::models::OperationType;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration structure mirroring `config/default.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OperationsConfig {
    pub batching: BatchingConfig,
    pub retry: RetryConfig,
    pub execution: ExecutionConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    /// Per-operation-type batching overrides keyed by operation type name
    pub overrides: HashMap<String, BatchingOverride>,
}

impl OperationsConfig {
    /// Batching settings for an operation type, with overrides applied
    pub fn batching_for(&self, operation_type: OperationType) -> BatchingConfig {
        match self.overrides.get(operation_type.as_str()) {
            Some(overrides) => self.batching.with_override(overrides),
            None => self.batching.clone(),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.batching.validate()?;
        for (name, overrides) in &self.overrides {
            if name.parse::<OperationType>().is_err() {
                return Err(ConfigurationError::invalid_value(
                    "overrides",
                    name,
                    "unknown operation type",
                ));
            }
            self.batching.with_override(overrides).validate()?;
        }
        self.retry.validate()?;

        if self.execution.item_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.item_timeout_ms",
                0,
                "must be positive",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                0,
                "must be positive",
            ));
        }

        Ok(())
    }
}

/// How a sweep is split into batches and how each batch is fanned out
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Maximum watermarks per batch
    pub batch_size: u32,
    /// Maximum batches planned and dispatched per orchestration step
    pub max_parallel_batches: u32,
    /// Items in flight per batch; -1 runs the whole batch at once.
    ///
    /// Batches of one step run side by side, so up to
    /// `max_parallel_batches * thread_count` items can be in flight at once.
    pub thread_count: i32,
}

impl BatchingConfig {
    /// Upper bound on concurrent item calls across one step, `None` when
    /// `thread_count` is -1
    pub fn max_items_in_flight(&self) -> Option<u64> {
        let per_batch = u64::try_from(self.thread_count).ok()?;
        Some(per_batch.min(u64::from(self.batch_size)) * u64::from(self.max_parallel_batches))
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            max_parallel_batches: defaults::MAX_PARALLEL_BATCHES,
            thread_count: defaults::THREAD_COUNT,
        }
    }
}

impl BatchingConfig {
    pub fn with_override(&self, overrides: &BatchingOverride) -> Self {
        Self {
            batch_size: overrides.batch_size.unwrap_or(self.batch_size),
            max_parallel_batches: overrides
                .max_parallel_batches
                .unwrap_or(self.max_parallel_batches),
            thread_count: overrides.thread_count.unwrap_or(self.thread_count),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size < 1 {
            return Err(ConfigurationError::invalid_value(
                "batching.batch_size",
                self.batch_size,
                "must be at least 1",
            ));
        }
        if self.max_parallel_batches < 1 {
            return Err(ConfigurationError::invalid_value(
                "batching.max_parallel_batches",
                self.max_parallel_batches,
                "must be at least 1",
            ));
        }
        if self.thread_count != UNBOUNDED_THREAD_COUNT && self.thread_count < 1 {
            return Err(ConfigurationError::invalid_value(
                "batching.thread_count",
                self.thread_count,
                "must be positive or -1 for unbounded",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatchingOverride {
    pub batch_size: Option<u32>,
    pub max_parallel_batches: Option<u32>,
    pub thread_count: Option<i32>,
}

/// Batch-level retry policy
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries allowed for one batch after its first attempt
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            retry_backoff_ms: defaults::RETRY_BACKOFF_MS,
            max_backoff_ms: defaults::MAX_BACKOFF_MS,
            backoff_multiplier: defaults::BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.backoff_multiplier >= 1.0) {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                self.backoff_multiplier,
                "must be at least 1.0",
            ));
        }
        if self.max_backoff_ms < self.retry_backoff_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_backoff_ms",
                self.max_backoff_ms,
                "must not be smaller than retry.retry_backoff_ms",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Deadline for a single per-item processor call
    pub item_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            item_timeout_ms: defaults::ITEM_TIMEOUT_MS,
        }
    }
}

impl ExecutionConfig {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Overrides the per-environment default level when set
    pub level: Option<String>,
    /// Emit JSON lines in addition to the console format
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Instance store schema version, selects the capability strategy
    pub schema_version: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema_version: defaults::SCHEMA_VERSION,
        }
    }
}
