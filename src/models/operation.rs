//! Operation identity, type and typed inputs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::instance::InstanceFilter;

/// Identifier of one long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Simple format keeps ids free of dashes in file names and logs
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kinds of watermark sweeps the service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Re-extract extended query tags for every instance
    Reindex,
    /// Copy instance blobs and metadata to the secondary layout
    Duplicate,
    /// Move instances to the current storage layout
    Migration,
    /// Remove stale artifacts left behind by failed writes
    DataCleanup,
    /// Populate content length for instances stored before it was tracked
    ContentLengthBackfill,
    /// Export instance files to an external destination
    Export,
}

impl OperationType {
    pub const ALL: [OperationType; 6] = [
        Self::Reindex,
        Self::Duplicate,
        Self::Migration,
        Self::DataCleanup,
        Self::ContentLengthBackfill,
        Self::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reindex => "reindex",
            Self::Duplicate => "duplicate",
            Self::Migration => "migration",
            Self::DataCleanup => "data_cleanup",
            Self::ContentLengthBackfill => "content_length_backfill",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|operation_type| operation_type.as_str() == s)
            .ok_or_else(|| format!("Invalid operation type: {s}"))
    }
}

/// Operation-specific input parameters, persisted with the checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation_type", rename_all = "snake_case")]
pub enum OperationInput {
    Reindex {
        query_tag_keys: Vec<i32>,
    },
    Duplicate,
    Migration {
        #[serde(default)]
        filter: InstanceFilter,
    },
    DataCleanup {
        start_filter_time_stamp: DateTime<Utc>,
        end_filter_time_stamp: DateTime<Utc>,
    },
    ContentLengthBackfill,
    Export {
        destination: String,
    },
}

impl OperationInput {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Reindex { .. } => OperationType::Reindex,
            Self::Duplicate => OperationType::Duplicate,
            Self::Migration { .. } => OperationType::Migration,
            Self::DataCleanup { .. } => OperationType::DataCleanup,
            Self::ContentLengthBackfill => OperationType::ContentLengthBackfill,
            Self::Export { .. } => OperationType::Export,
        }
    }

    /// Instance filter passed to the instance store for every query
    pub fn filter(&self) -> InstanceFilter {
        match self {
            Self::Migration { filter } => filter.clone(),
            Self::DataCleanup {
                start_filter_time_stamp,
                end_filter_time_stamp,
            } => InstanceFilter::created_between(*start_filter_time_stamp, *end_filter_time_stamp),
            _ => InstanceFilter::default(),
        }
    }

    /// Identifiers surfaced to status queries
    pub fn resource_ids(&self) -> Vec<String> {
        match self {
            Self::Reindex { query_tag_keys } => {
                query_tag_keys.iter().map(|key| key.to_string()).collect()
            }
            Self::Export { destination } => vec![destination.clone()],
            _ => Vec::new(),
        }
    }
}
