//! Error types for long-running operation orchestration.
//!

use std::time::Duration;

use thiserror::Error;

use crate::models::{OperationId, OperationType, WatermarkRange};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    /// Malformed range, non-positive batch or thread count. Never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A single per-item processor call failed
    #[error("Item {identifier} failed: {reason}")]
    TransientItemFailure { identifier: String, reason: String },

    /// A per-item processor call exceeded its deadline
    #[error("Item {identifier} timed out after {timeout:?}")]
    ItemTimeout {
        identifier: String,
        timeout: Duration,
    },

    /// A batch range does not abut the checkpoint's completed range
    #[error("Batch {batch} is not contiguous with completed range {completed}")]
    NonContiguousCheckpoint {
        completed: WatermarkRange,
        batch: WatermarkRange,
    },

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Operation {0} not found")]
    OperationNotFound(OperationId),

    #[error("Operation {operation_type} is not supported by schema version {schema_version}")]
    UnsupportedOperation {
        operation_type: OperationType,
        schema_version: u32,
    },

    #[error("No item processor registered for {0}")]
    ProcessorNotRegistered(OperationType),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("State transition error: {0}")]
    StateTransitionError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl OperationError {
    /// Whether the orchestrator may retry the batch that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientItemFailure { .. } | Self::ItemTimeout { .. } | Self::StoreError(_)
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wrap a collaborator failure, keeping the full context chain.
    pub fn store(error: &anyhow::Error) -> Self {
        Self::StoreError(format!("{error:#}"))
    }

    pub fn item_failure(identifier: impl ToString, error: &anyhow::Error) -> Self {
        Self::TransientItemFailure {
            identifier: identifier.to_string(),
            reason: format!("{error:#}"),
        }
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(error: serde_json::Error) -> Self {
        OperationError::SerializationError(error.to_string())
    }
}

impl From<crate::config::ConfigurationError> for OperationError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        OperationError::ConfigurationError(error.to_string())
    }
}

pub type OperationResult<T> = std::result::Result<T, OperationError>;
