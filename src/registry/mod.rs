//! # Processor Registry
//!
//! Maps each operation type to the per-instance processor that does the real
//! work (copy, reindex, delete, export...). The orchestrator resolves the
//! processor once per run and hands it to every item task.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use dicom_operations::models::{InstanceIdentifier, OperationType};
//! use dicom_operations::registry::{ItemProcessor, ProcessorRegistry};
//!
//! struct NoopProcessor;
//!
//! #[async_trait]
//! impl ItemProcessor for NoopProcessor {
//!     async fn process(
//!         &self,
//!         _identifier: &InstanceIdentifier,
//!         _cancellation: CancellationToken,
//!     ) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! let registry = ProcessorRegistry::new();
//! registry.register(OperationType::Duplicate, Arc::new(NoopProcessor));
//! assert!(registry.get(OperationType::Duplicate).is_ok());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{OperationError, OperationResult};
use crate::models::{InstanceIdentifier, OperationType};

/// Idempotent single-instance unit of work.
///
/// May be invoked more than once for the same identifier when a batch is
/// retried or a checkpoint is replayed.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(
        &self,
        identifier: &InstanceIdentifier,
        cancellation: CancellationToken,
    ) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct ProcessorRegistry {
    processors: RwLock<HashMap<OperationType, Arc<dyn ItemProcessor>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor, replacing any previous one for the type
    pub fn register(&self, operation_type: OperationType, processor: Arc<dyn ItemProcessor>) {
        let replaced = self
            .processors
            .write()
            .insert(operation_type, processor)
            .is_some();
        info!(operation_type = %operation_type, replaced, "Registered item processor");
    }

    pub fn get(&self, operation_type: OperationType) -> OperationResult<Arc<dyn ItemProcessor>> {
        self.processors
            .read()
            .get(&operation_type)
            .cloned()
            .ok_or(OperationError::ProcessorNotRegistered(operation_type))
    }

    pub fn is_registered(&self, operation_type: OperationType) -> bool {
        self.processors.read().contains_key(&operation_type)
    }

    pub fn registered_types(&self) -> Vec<OperationType> {
        let mut types: Vec<OperationType> = self.processors.read().keys().copied().collect();
        types.sort_by_key(|operation_type| operation_type.as_str());
        types
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("registered_types", &self.registered_types())
            .finish()
    }
}
