use serde::{Deserialize, Serialize};

/// Events that can trigger operation status transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OperationEvent {
    /// Orchestration took its first step
    Start,
    /// Target range fully covered
    Complete,
    /// Fatal error or retries exhausted
    Fail(String),
    /// Caller requested cancellation
    Cancel,
    /// Operator restarted a failed or canceled operation from its checkpoint
    Resume,
}

impl OperationEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
            Self::Resume => "resume",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
