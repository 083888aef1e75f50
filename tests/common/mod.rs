#![allow(dead_code)]

pub mod mocks;
pub mod strategies;

pub use mocks::*;
pub use strategies::*;

use dicom_operations::config::{BatchingConfig, OperationsConfig};

/// Configuration with retries that never sleep
pub fn test_config(batch_size: u32, thread_count: i32, max_retries: u32) -> OperationsConfig {
    let mut config = OperationsConfig::default();
    config.batching = BatchingConfig {
        batch_size,
        max_parallel_batches: 1,
        thread_count,
    };
    config.retry.max_retries = max_retries;
    config.retry.retry_backoff_ms = 0;
    config.retry.max_backoff_ms = 0;
    config.retry.backoff_multiplier = 1.0;
    config
}
