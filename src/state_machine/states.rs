use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Accepted but the orchestration has not taken its first step
    #[default]
    NotStarted,
    /// Orchestration is sweeping batches
    Running,
    /// Every watermark up to the target has been processed
    Completed,
    /// Retries were exhausted or a fatal error occurred
    Failed,
    /// Canceled by the caller at a step boundary
    Canceled,
}

impl OperationStatus {
    /// Check if this is a terminal state (the orchestration is no longer running)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Check if an operator may resume from the persisted checkpoint
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Failed | Self::Canceled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("Invalid operation status: {s}")),
        }
    }
}

/// Progress state of a checkpoint, derived from its completed range and target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Created,
    InProgress,
    Complete,
}

impl fmt::Display for CheckpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::Canceled.is_terminal());
        assert!(!OperationStatus::NotStarted.is_terminal());
        assert!(!OperationStatus::Running.is_terminal());
    }

    #[test]
    fn test_resumable_check() {
        assert!(OperationStatus::Failed.is_resumable());
        assert!(OperationStatus::Canceled.is_resumable());
        assert!(!OperationStatus::Completed.is_resumable());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(OperationStatus::NotStarted.to_string(), "not_started");
        assert_eq!(
            "canceled".parse::<OperationStatus>().unwrap(),
            OperationStatus::Canceled
        );
        assert!("paused".parse::<OperationStatus>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&OperationStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let parsed: CheckpointState = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, CheckpointState::InProgress);
    }
}
