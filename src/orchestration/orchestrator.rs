//! # Batch Orchestrator
//!
//! Drives one operation from its checkpoint to completion:
//!
//! 1. Snapshot the instance store's max watermark as the sweep target (once).
//! 2. Stop when the checkpoint covers the target, or when cancellation was
//!    requested.
//! 3. Plan the next batch(es) from `completed.end + 1`.
//! 4. Fan each batch out to the item processor through [`TaskBatch`].
//! 5. Advance and persist the checkpoint for each confirmed batch, oldest
//!    first, stopping at the first failed batch.
//! 6. On failure, back off and retry the same range until retries run out.
//!
//! Re-running with a persisted checkpoint never reprocesses watermarks at or
//! below `completed.end` and never skips a watermark above it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::batch_planner::BatchPlanner;
use super::retry::RetryPolicy;
use super::task_batch::TaskBatch;
use crate::config::OperationsConfig;
use crate::constants::events;
use crate::error::{OperationError, OperationResult};
use crate::events::EventPublisher;
use crate::logging::{log_batch_operation, log_error, log_operation_event};
use crate::models::{InstanceFilter, OperationCheckpoint, WatermarkRange};
use crate::registry::ItemProcessor;
use crate::state_machine::OperationStatus;
use crate::store::{CheckpointStore, InstanceStore};

/// How a run of the orchestrator ended. The checkpoint is the last one that
/// was persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationOutcome {
    Completed(OperationCheckpoint),
    Failed {
        checkpoint: OperationCheckpoint,
        error: OperationError,
    },
    Canceled(OperationCheckpoint),
}

impl OrchestrationOutcome {
    pub fn checkpoint(&self) -> &OperationCheckpoint {
        match self {
            Self::Completed(checkpoint) | Self::Canceled(checkpoint) => checkpoint,
            Self::Failed { checkpoint, .. } => checkpoint,
        }
    }

    pub fn status(&self) -> OperationStatus {
        match self {
            Self::Completed(_) => OperationStatus::Completed,
            Self::Failed { .. } => OperationStatus::Failed,
            Self::Canceled(_) => OperationStatus::Canceled,
        }
    }

    pub fn error(&self) -> Option<&OperationError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

pub struct BatchOrchestrator {
    instance_store: Arc<dyn InstanceStore>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    processor: Arc<dyn ItemProcessor>,
    retry_policy: RetryPolicy,
    item_timeout: Duration,
    event_publisher: EventPublisher,
}

impl BatchOrchestrator {
    pub fn new(
        instance_store: Arc<dyn InstanceStore>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        processor: Arc<dyn ItemProcessor>,
        config: &OperationsConfig,
    ) -> Self {
        Self {
            instance_store,
            checkpoint_store,
            processor,
            retry_policy: RetryPolicy::from(&config.retry),
            item_timeout: config.execution.item_timeout(),
            event_publisher: EventPublisher::new(config.events.channel_capacity),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_item_timeout(mut self, item_timeout: Duration) -> Self {
        self.item_timeout = item_timeout;
        self
    }

    pub fn with_event_publisher(mut self, event_publisher: EventPublisher) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    pub fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    /// Run the operation until it completes, fails or is canceled.
    ///
    /// Cancellation is only observed between steps; a wave that has been
    /// dispatched always settles first.
    #[instrument(
        skip(self, checkpoint, cancellation),
        fields(
            operation_id = %checkpoint.operation_id,
            operation_type = %checkpoint.operation_type()
        )
    )]
    pub async fn run(
        &self,
        checkpoint: OperationCheckpoint,
        cancellation: CancellationToken,
    ) -> OrchestrationOutcome {
        let planner = match BatchPlanner::from_config(&checkpoint.batching) {
            Ok(planner) => planner,
            Err(error) => return self.fail(checkpoint, error),
        };
        let executor = match TaskBatch::new(checkpoint.batching.thread_count) {
            Ok(executor) => executor,
            Err(error) => return self.fail(checkpoint, error),
        };
        let filter = checkpoint.input.filter();

        let mut checkpoint = match self.ensure_target(checkpoint, &filter, &cancellation).await {
            Ok(checkpoint) => checkpoint,
            Err(outcome) => return outcome,
        };

        self.publish(events::OPERATION_STARTED, &checkpoint, json!({
            "target_max_watermark": checkpoint.target_max_watermark(),
            "completed": checkpoint.completed().map(|range| range.to_string()),
        }));
        log_operation_event(
            checkpoint.operation_id,
            checkpoint.operation_type().as_str(),
            "started",
            checkpoint.percent_complete(),
            None,
        );

        let mut failed_attempts: u32 = 0;

        loop {
            if checkpoint.is_complete() {
                return self.complete(checkpoint);
            }
            if cancellation.is_cancelled() {
                return self.cancel(checkpoint);
            }

            let ranges = planner.next_ranges(checkpoint.remaining_range());
            if ranges.is_empty() {
                return self.complete(checkpoint);
            }

            let step_started = Instant::now();
            let results = join_all(
                ranges
                    .iter()
                    .map(|range| self.process_range(*range, &executor, &filter)),
            )
            .await;

            let mut step_error = None;
            for (range, result) in ranges.iter().zip(results) {
                let confirmed = match result {
                    Ok(item_count) => self
                        .confirm_batch(&checkpoint, *range)
                        .await
                        .map(|advanced| (advanced, item_count)),
                    Err(error) => Err(error),
                };

                match confirmed {
                    Ok((advanced, item_count)) => {
                        checkpoint = advanced;
                        log_batch_operation(
                            checkpoint.operation_id,
                            *range,
                            failed_attempts + 1,
                            "completed",
                            Some(item_count),
                            Some(step_started.elapsed().as_millis() as u64),
                        );
                        failed_attempts = 0;
                    }
                    Err(error) => {
                        // later ranges of this step are planned again from the checkpoint
                        step_error = Some((*range, error));
                        break;
                    }
                }
            }

            let Some((range, error)) = step_error else {
                continue;
            };

            failed_attempts += 1;
            log_batch_operation(
                checkpoint.operation_id,
                range,
                failed_attempts,
                "failed",
                None,
                Some(step_started.elapsed().as_millis() as u64),
            );
            self.publish(events::OPERATION_BATCH_FAILED, &checkpoint, json!({
                "range": range.to_string(),
                "attempt": failed_attempts,
                "error": error.to_string(),
            }));

            if !error.is_retryable() {
                return self.fail(checkpoint, error);
            }
            if !self.retry_policy.should_retry(failed_attempts) {
                let exhausted = OperationError::RetriesExhausted {
                    attempts: failed_attempts,
                    last_error: error.to_string(),
                };
                return self.fail(checkpoint, exhausted);
            }

            let delay = self.retry_policy.delay_for(failed_attempts);
            warn!(
                range = %range,
                attempt = failed_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Batch failed, retrying after backoff"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancellation.cancelled() => {
                    debug!("Cancellation requested during backoff");
                }
            }
        }
    }

    /// Snapshot and persist the sweep target on the first run
    async fn ensure_target(
        &self,
        mut checkpoint: OperationCheckpoint,
        filter: &InstanceFilter,
        cancellation: &CancellationToken,
    ) -> Result<OperationCheckpoint, OrchestrationOutcome> {
        if checkpoint.target_max_watermark().is_some() {
            debug!(
                target_max_watermark = ?checkpoint.target_max_watermark(),
                "Resuming with snapshotted target"
            );
            return Ok(checkpoint);
        }

        let mut failed_attempts = 0;
        let max_watermark = loop {
            if cancellation.is_cancelled() {
                return Err(self.cancel(checkpoint));
            }
            match self.instance_store.get_max_watermark(filter).await {
                Ok(max_watermark) => break max_watermark,
                Err(error) => {
                    let error = OperationError::store(&error);
                    failed_attempts += 1;
                    if !self.retry_policy.should_retry(failed_attempts) {
                        let exhausted = OperationError::RetriesExhausted {
                            attempts: failed_attempts,
                            last_error: error.to_string(),
                        };
                        return Err(self.fail(checkpoint, exhausted));
                    }
                    warn!(attempt = failed_attempts, error = %error, "Max watermark query failed");
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_policy.delay_for(failed_attempts)) => {}
                        _ = cancellation.cancelled() => {
                            debug!("Cancellation requested while snapshotting target");
                        }
                    }
                }
            }
        };

        // an empty store is swept trivially
        let target = checkpoint.snapshot_target(max_watermark.unwrap_or(0));
        info!(target_max_watermark = target, "Snapshotted sweep target");

        match self.persist(&checkpoint).await {
            Ok(()) => Ok(checkpoint),
            Err(error) => Err(self.fail(checkpoint, error)),
        }
    }

    /// Fetch the range's identifiers and run them through the executor
    async fn process_range(
        &self,
        range: WatermarkRange,
        executor: &TaskBatch,
        filter: &InstanceFilter,
    ) -> OperationResult<usize> {
        let identifiers = self
            .instance_store
            .get_instance_identifiers(filter, range)
            .await
            .map_err(|error| OperationError::store(&error))?;

        debug!(range = %range, items = identifiers.len(), "Dispatching batch");

        let item_timeout = self.item_timeout;
        executor
            .run(identifiers, |identifier| {
                let processor = Arc::clone(&self.processor);
                async move {
                    let deadline = CancellationToken::new();
                    let call = processor.process(&identifier, deadline.clone());
                    match tokio::time::timeout(item_timeout, call).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(error)) => Err(OperationError::item_failure(&identifier, &error)),
                        Err(_) => {
                            deadline.cancel();
                            Err(OperationError::ItemTimeout {
                                identifier: identifier.to_string(),
                                timeout: item_timeout,
                            })
                        }
                    }
                }
            })
            .await
    }

    /// Advance a copy of the checkpoint and make it durable. The caller only
    /// adopts the copy once the write succeeded.
    async fn confirm_batch(
        &self,
        checkpoint: &OperationCheckpoint,
        range: WatermarkRange,
    ) -> OperationResult<OperationCheckpoint> {
        let mut advanced = checkpoint.clone();
        let completed = advanced.advance_completed(range)?;
        self.persist(&advanced).await?;

        self.publish(events::OPERATION_BATCH_COMPLETED, &advanced, json!({
            "range": range.to_string(),
            "completed": completed.to_string(),
            "percent_complete": advanced.percent_complete(),
        }));
        Ok(advanced)
    }

    async fn persist(&self, checkpoint: &OperationCheckpoint) -> OperationResult<()> {
        self.checkpoint_store
            .save(checkpoint)
            .await
            .map_err(|error| OperationError::store(&error))
    }

    fn complete(&self, checkpoint: OperationCheckpoint) -> OrchestrationOutcome {
        self.publish(events::OPERATION_COMPLETED, &checkpoint, json!({
            "completed": checkpoint.completed().map(|range| range.to_string()),
        }));
        log_operation_event(
            checkpoint.operation_id,
            checkpoint.operation_type().as_str(),
            "completed",
            checkpoint.percent_complete(),
            None,
        );
        OrchestrationOutcome::Completed(checkpoint)
    }

    fn cancel(&self, checkpoint: OperationCheckpoint) -> OrchestrationOutcome {
        self.publish(events::OPERATION_CANCELED, &checkpoint, json!({
            "completed": checkpoint.completed().map(|range| range.to_string()),
        }));
        log_operation_event(
            checkpoint.operation_id,
            checkpoint.operation_type().as_str(),
            "canceled",
            checkpoint.percent_complete(),
            None,
        );
        OrchestrationOutcome::Canceled(checkpoint)
    }

    fn fail(&self, checkpoint: OperationCheckpoint, error: OperationError) -> OrchestrationOutcome {
        let message = error.to_string();
        self.publish(events::OPERATION_FAILED, &checkpoint, json!({
            "error": message,
            "completed": checkpoint.completed().map(|range| range.to_string()),
        }));
        log_error(
            "BatchOrchestrator",
            "run",
            &message,
            Some(&format!("operation_id={}", checkpoint.operation_id)),
        );
        log_operation_event(
            checkpoint.operation_id,
            checkpoint.operation_type().as_str(),
            "failed",
            checkpoint.percent_complete(),
            Some(&message),
        );
        OrchestrationOutcome::Failed { checkpoint, error }
    }

    fn publish(&self, event_name: &str, checkpoint: &OperationCheckpoint, context: serde_json::Value) {
        self.event_publisher
            .publish(event_name, checkpoint.operation_id, context);
    }
}
