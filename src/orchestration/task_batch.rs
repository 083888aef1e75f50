//! # Bounded Concurrency Executor
//!
//! Runs one per-item task for every item, at most `thread_count` in flight.
//! Items are cut into consecutive waves of `thread_count`; a wave is awaited
//! in full before the next one starts, so a failure is reported only after
//! its wave settles and no later wave is started.

use std::future::Future;

use futures::future::join_all;
use tracing::{debug, instrument};

use crate::constants::UNBOUNDED_THREAD_COUNT;
use crate::error::{OperationError, OperationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskBatch {
    thread_count: i32,
}

impl TaskBatch {
    /// `thread_count` must be positive, or -1 to run every item at once
    pub fn new(thread_count: i32) -> OperationResult<Self> {
        if thread_count == UNBOUNDED_THREAD_COUNT || thread_count > 0 {
            Ok(Self { thread_count })
        } else {
            Err(OperationError::invalid_argument(format!(
                "thread count must be positive or {UNBOUNDED_THREAD_COUNT}, got {thread_count}"
            )))
        }
    }

    pub fn thread_count(&self) -> i32 {
        self.thread_count
    }

    /// Items per wave for a list of `item_count` items
    pub fn wave_size(&self, item_count: usize) -> usize {
        if self.thread_count == UNBOUNDED_THREAD_COUNT {
            item_count.max(1)
        } else {
            self.thread_count as usize
        }
    }

    /// Run `task` once per item, wave by wave.
    ///
    /// Returns the number of items processed. On failure, the first error of
    /// the failing wave (in item order) is returned once the whole wave has
    /// settled.
    #[instrument(skip_all, fields(items = items.len(), thread_count = self.thread_count))]
    pub async fn run<T, F, Fut>(&self, items: Vec<T>, task: F) -> OperationResult<usize>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = OperationResult<()>>,
    {
        let wave_size = self.wave_size(items.len());
        let mut remaining = items.into_iter();
        let mut processed = 0;
        let mut wave_number = 0;

        loop {
            let wave: Vec<Fut> = remaining.by_ref().take(wave_size).map(&task).collect();
            if wave.is_empty() {
                break;
            }
            wave_number += 1;
            let wave_len = wave.len();

            let results = join_all(wave).await;
            if let Some(error) = results.into_iter().find_map(Result::err) {
                debug!(wave = wave_number, wave_len, error = %error, "Wave failed");
                return Err(error);
            }

            processed += wave_len;
            debug!(wave = wave_number, wave_len, processed, "Wave completed");
        }

        Ok(processed)
    }
}

/// Run `task` over `items` with at most `thread_count` in flight
pub async fn run<T, F, Fut>(items: Vec<T>, task: F, thread_count: i32) -> OperationResult<usize>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = OperationResult<()>>,
{
    TaskBatch::new(thread_count)?.run(items, task).await
}
