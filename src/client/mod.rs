//! # Operation Client
//!
//! Upward-facing boundary of the batching core: start an operation, query
//! its status, cancel it, resume it after a failure and wait for it to end.
//! Each started operation runs its [`BatchOrchestrator`] on a tokio task.
//!
//! Progress in status reports is read from the checkpoint store, so it always
//! reflects the last persisted batch.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use dicom_operations::client::OperationClient;
//! # use dicom_operations::config::OperationsConfig;
//! # use dicom_operations::models::OperationInput;
//! # use dicom_operations::registry::ProcessorRegistry;
//! # use dicom_operations::store::{InMemoryCheckpointStore, InstanceStore};
//! # async fn example(instances: Arc<dyn InstanceStore>) -> dicom_operations::OperationResult<()> {
//! let registry = Arc::new(ProcessorRegistry::new());
//! let client = OperationClient::builder(
//!     OperationsConfig::default(),
//!     instances,
//!     Arc::new(InMemoryCheckpointStore::new()),
//!     registry,
//! )
//! .build()?;
//!
//! let id = client.start(OperationInput::Reindex { query_tag_keys: vec![4] }).await?;
//! let report = client.get_status(id).await?;
//! println!("{} is {} ({}%)", id, report.status, report.percent_complete);
//! # Ok(())
//! # }
//! ```

pub mod ids;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::OperationsConfig;
use crate::error::{OperationError, OperationResult};
use crate::events::{EventPublisher, PublishedEvent};
use crate::models::{OperationCheckpoint, OperationId, OperationInput, OperationType};
use crate::orchestration::{BatchOrchestrator, OrchestrationOutcome};
use crate::registry::ProcessorRegistry;
use crate::state_machine::{determine_target_status, OperationEvent, OperationStatus};
use crate::store::{CheckpointStore, InstanceStore, SchemaVersion, StoreCapabilities};

pub use ids::{Clock, FixedClock, OperationIdGenerator, RandomIdGenerator, SequentialIdGenerator, SystemClock};

/// Status of one operation as surfaced to API callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStatusReport {
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub percent_complete: u8,
    pub created_time: Option<DateTime<Utc>>,
    pub resource_ids: Vec<String>,
}

/// In-process state of an operation run
struct OperationHandle {
    status: RwLock<OperationStatus>,
    cancellation: CancellationToken,
    outcome: watch::Receiver<Option<OrchestrationOutcome>>,
}

impl OperationHandle {
    fn status(&self) -> OperationStatus {
        *self.status.read()
    }

    fn apply(&self, event: &OperationEvent) -> OperationResult<OperationStatus> {
        let mut status = self.status.write();
        let target = determine_target_status(*status, event)?;
        *status = target;
        Ok(target)
    }
}

pub struct OperationClientBuilder {
    config: OperationsConfig,
    instance_store: Arc<dyn InstanceStore>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    registry: Arc<ProcessorRegistry>,
    id_generator: Arc<dyn OperationIdGenerator>,
    clock: Arc<dyn Clock>,
}

impl OperationClientBuilder {
    pub fn id_generator(mut self, id_generator: Arc<dyn OperationIdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and resolve the store schema strategy
    pub fn build(self) -> OperationResult<OperationClient> {
        self.config.validate()?;
        let schema_version = SchemaVersion::try_from(self.config.store.schema_version)?;
        let event_publisher = EventPublisher::new(self.config.events.channel_capacity);

        info!(
            schema_version = %schema_version,
            registered_types = ?self.registry.registered_types(),
            "Operation client ready"
        );

        Ok(OperationClient {
            config: self.config,
            instance_store: self.instance_store,
            checkpoint_store: self.checkpoint_store,
            registry: self.registry,
            capabilities: schema_version.capabilities(),
            id_generator: self.id_generator,
            clock: self.clock,
            event_publisher,
            operations: DashMap::new(),
        })
    }
}

pub struct OperationClient {
    config: OperationsConfig,
    instance_store: Arc<dyn InstanceStore>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    registry: Arc<ProcessorRegistry>,
    capabilities: &'static StoreCapabilities,
    id_generator: Arc<dyn OperationIdGenerator>,
    clock: Arc<dyn Clock>,
    event_publisher: EventPublisher,
    /// One handle per run started by this client. Finished runs stay here so
    /// that `get_status` can report `Failed`/`Canceled`, until `forget`
    /// releases them.
    operations: DashMap<OperationId, Arc<OperationHandle>>,
}

impl OperationClient {
    pub fn builder(
        config: OperationsConfig,
        instance_store: Arc<dyn InstanceStore>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        registry: Arc<ProcessorRegistry>,
    ) -> OperationClientBuilder {
        OperationClientBuilder {
            config,
            instance_store,
            checkpoint_store,
            registry,
            id_generator: Arc::new(RandomIdGenerator),
            clock: Arc::new(SystemClock),
        }
    }

    /// Lifecycle events of every operation run by this client
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PublishedEvent> {
        self.event_publisher.subscribe()
    }

    pub fn capabilities(&self) -> &'static StoreCapabilities {
        self.capabilities
    }

    /// Persist a fresh checkpoint and start sweeping in the background
    #[instrument(skip(self, input), fields(operation_type = %input.operation_type()))]
    pub async fn start(&self, input: OperationInput) -> OperationResult<OperationId> {
        let operation_type = input.operation_type();
        self.capabilities.ensure_supported(operation_type)?;
        let batching = self.config.batching_for(operation_type);
        batching.validate()?;
        // fail before persisting anything
        self.registry.get(operation_type)?;

        let operation_id = self.id_generator.next_id();
        let checkpoint = OperationCheckpoint::new(operation_id, input, batching, self.clock.now());
        self.save(&checkpoint).await?;

        self.launch(checkpoint, OperationStatus::NotStarted, OperationEvent::Start)?;
        info!(operation_id = %operation_id, "Operation started");
        Ok(operation_id)
    }

    /// Status and last persisted progress of an operation.
    ///
    /// Operations known only from the checkpoint store (for example after a
    /// restart) report `Completed` when their checkpoint is complete and
    /// `NotStarted` otherwise.
    pub async fn get_status(&self, operation_id: OperationId) -> OperationResult<OperationStatusReport> {
        let checkpoint = self.load(operation_id).await?;
        let status = match self.handle(operation_id) {
            Some(handle) => handle.status(),
            None if checkpoint.is_complete() => OperationStatus::Completed,
            None => OperationStatus::NotStarted,
        };

        // an empty sweep is complete without ever confirming a range
        let percent_complete = if checkpoint.completed().is_none() && checkpoint.is_complete() {
            100
        } else {
            checkpoint.percent_complete()
        };

        Ok(OperationStatusReport {
            operation_id,
            operation_type: checkpoint.operation_type(),
            status,
            percent_complete,
            created_time: checkpoint.created_time(),
            resource_ids: checkpoint.resource_ids(),
        })
    }

    /// Request cooperative cancellation.
    ///
    /// No new batch is planned after this returns, but a wave already in
    /// flight settles first; the status turns `Canceled` once the run stops.
    #[instrument(skip(self))]
    pub fn cancel(&self, operation_id: OperationId) -> OperationResult<()> {
        let handle = self
            .handle(operation_id)
            .ok_or(OperationError::OperationNotFound(operation_id))?;
        determine_target_status(handle.status(), &OperationEvent::Cancel)?;

        handle.cancellation.cancel();
        info!(operation_id = %operation_id, "Cancellation requested");
        Ok(())
    }

    /// Restart a failed, canceled or interrupted operation from its persisted
    /// checkpoint
    #[instrument(skip(self))]
    pub async fn resume(&self, operation_id: OperationId) -> OperationResult<()> {
        let (from, event) = match self.handle(operation_id) {
            Some(handle) => {
                let current = handle.status();
                determine_target_status(current, &OperationEvent::Resume)?;
                (current, OperationEvent::Resume)
            }
            None => (OperationStatus::NotStarted, OperationEvent::Start),
        };

        let checkpoint = self.load(operation_id).await?;
        if checkpoint.is_complete() {
            return Err(OperationError::StateTransitionError(format!(
                "operation {operation_id} has already completed"
            )));
        }

        self.launch(checkpoint, from, event)?;
        info!(operation_id = %operation_id, "Operation resumed");
        Ok(())
    }

    /// Wait for the current run of an operation to end
    pub async fn wait(&self, operation_id: OperationId) -> OperationResult<OrchestrationOutcome> {
        let mut outcome = self
            .handle(operation_id)
            .ok_or(OperationError::OperationNotFound(operation_id))?
            .outcome
            .clone();

        let finished = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| {
                OperationError::StateTransitionError(format!(
                    "operation {operation_id} stopped without reporting an outcome"
                ))
            })?;

        finished
            .clone()
            .ok_or(OperationError::OperationNotFound(operation_id))
    }

    /// Release the in-process handle of a finished run.
    ///
    /// The checkpoint stays in the store, so afterwards the operation reports
    /// as if it had been loaded after a restart and can still be resumed.
    #[instrument(skip(self))]
    pub fn forget(&self, operation_id: OperationId) -> OperationResult<()> {
        let handle = self
            .handle(operation_id)
            .ok_or(OperationError::OperationNotFound(operation_id))?;
        if !handle.status().is_terminal() {
            return Err(OperationError::StateTransitionError(format!(
                "operation {operation_id} is still {}",
                handle.status()
            )));
        }

        self.operations
            .remove_if(&operation_id, |_, handle| handle.status().is_terminal());
        debug!(operation_id = %operation_id, "Released finished operation handle");
        Ok(())
    }

    /// Number of runs this client still holds a handle for
    pub fn tracked_operations(&self) -> usize {
        self.operations.len()
    }

    /// Every operation with a persisted checkpoint
    pub async fn list_operations(&self) -> OperationResult<Vec<OperationId>> {
        self.checkpoint_store
            .list()
            .await
            .map_err(|error| OperationError::store(&error))
    }

    fn launch(
        &self,
        checkpoint: OperationCheckpoint,
        from: OperationStatus,
        event: OperationEvent,
    ) -> OperationResult<()> {
        let processor = self.registry.get(checkpoint.operation_type())?;
        let running = determine_target_status(from, &event)?;

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let handle = Arc::new(OperationHandle {
            status: RwLock::new(running),
            cancellation: CancellationToken::new(),
            outcome: outcome_rx,
        });
        self.operations
            .insert(checkpoint.operation_id, Arc::clone(&handle));

        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&self.instance_store),
            Arc::clone(&self.checkpoint_store),
            processor,
            &self.config,
        )
        .with_event_publisher(self.event_publisher.clone());

        tokio::spawn(async move {
            let outcome = orchestrator
                .run(checkpoint, handle.cancellation.clone())
                .await;

            let event = match &outcome {
                OrchestrationOutcome::Completed(_) => OperationEvent::Complete,
                OrchestrationOutcome::Failed { error, .. } => {
                    OperationEvent::fail_with_error(error.to_string())
                }
                OrchestrationOutcome::Canceled(_) => OperationEvent::Cancel,
            };
            if let Err(error) = handle.apply(&event) {
                tracing::error!(error = %error, "Operation status out of sync with run outcome");
            }
            outcome_tx.send_replace(Some(outcome));
        });

        Ok(())
    }

    fn handle(&self, operation_id: OperationId) -> Option<Arc<OperationHandle>> {
        self.operations
            .get(&operation_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    async fn load(&self, operation_id: OperationId) -> OperationResult<OperationCheckpoint> {
        self.checkpoint_store
            .load(operation_id)
            .await
            .map_err(|error| OperationError::store(&error))?
            .ok_or(OperationError::OperationNotFound(operation_id))
    }

    async fn save(&self, checkpoint: &OperationCheckpoint) -> OperationResult<()> {
        self.checkpoint_store
            .save(checkpoint)
            .await
            .map_err(|error| OperationError::store(&error))
    }
}
