//! Instance identifiers and filters exchanged with the instance store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored instance addressed by its UIDs and creation watermark
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceIdentifier {
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub watermark: i64,
}

impl InstanceIdentifier {
    pub fn new(
        study_instance_uid: impl Into<String>,
        series_instance_uid: impl Into<String>,
        sop_instance_uid: impl Into<String>,
        watermark: i64,
    ) -> Self {
        Self {
            study_instance_uid: study_instance_uid.into(),
            series_instance_uid: series_instance_uid.into(),
            sop_instance_uid: sop_instance_uid.into(),
            watermark,
        }
    }
}

impl fmt::Display for InstanceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.study_instance_uid, self.series_instance_uid, self.sop_instance_uid, self.watermark
        )
    }
}

/// Restricts which instances an operation sweeps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFilter {
    /// Inclusive lower bound on instance creation time
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on instance creation time
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
}

impl InstanceFilter {
    pub fn created_between(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self {
            created_after: Some(after),
            created_before: Some(before),
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.created_after.is_none() && self.created_before.is_none()
    }

    pub fn matches(&self, created: DateTime<Utc>) -> bool {
        self.created_after.map_or(true, |after| created >= after)
            && self.created_before.map_or(true, |before| created < before)
    }
}
