//! # Batch Planner
//!
//! Splits the remaining watermark range into ascending, gap-free batches of at
//! most `batch_size` watermarks. A single planning call returns at most
//! `max_parallel_batches` batches; the orchestrator plans again from the new
//! checkpoint once those are confirmed.

use crate::config::BatchingConfig;
use crate::error::{OperationError, OperationResult};
use crate::models::{Batch, WatermarkRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlanner {
    batch_size: u32,
    max_parallel_batches: u32,
}

impl BatchPlanner {
    pub fn new(batch_size: u32, max_parallel_batches: u32) -> OperationResult<Self> {
        if batch_size < 1 {
            return Err(OperationError::invalid_argument(format!(
                "batch size must be at least 1, got {batch_size}"
            )));
        }
        if max_parallel_batches < 1 {
            return Err(OperationError::invalid_argument(format!(
                "max parallel batches must be at least 1, got {max_parallel_batches}"
            )));
        }

        Ok(Self {
            batch_size,
            max_parallel_batches,
        })
    }

    pub fn from_config(config: &BatchingConfig) -> OperationResult<Self> {
        Self::new(config.batch_size, config.max_parallel_batches)
    }

    /// Plan batches over `total` in one call
    pub fn plan(
        total: WatermarkRange,
        batch_size: u32,
        max_parallel_batches: u32,
    ) -> OperationResult<Vec<WatermarkRange>> {
        Ok(Self::new(batch_size, max_parallel_batches)?.next_ranges(Some(total)))
    }

    /// Next ranges to dispatch, oldest first. `None` means nothing remains.
    pub fn next_ranges(&self, remaining: Option<WatermarkRange>) -> Vec<WatermarkRange> {
        let Some(remaining) = remaining else {
            return Vec::new();
        };

        let batch_size = i64::from(self.batch_size);
        let mut ranges = Vec::with_capacity(self.max_parallel_batches.min(64) as usize);
        let mut start = remaining.start();

        while start <= remaining.end() && ranges.len() < self.max_parallel_batches as usize {
            let end = start
                .saturating_add(batch_size - 1)
                .min(remaining.end());
            ranges.push(WatermarkRange::from_ordered(start, end));

            match end.checked_add(1) {
                Some(next) => start = next,
                None => break,
            }
        }

        ranges
    }

    /// Next batches carrying the per-batch thread count
    pub fn next_batches(&self, remaining: Option<WatermarkRange>, thread_count: i32) -> Vec<Batch> {
        self.next_ranges(remaining)
            .into_iter()
            .map(|range| Batch {
                range,
                thread_count,
            })
            .collect()
    }
}
