//! Instance store schema versions and the capabilities each one offers.
//!
//! The version is resolved once at startup; callers look capabilities up in
//! a static table instead of probing the store per request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OperationError, OperationResult};
use crate::models::OperationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SchemaVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
}

/// A store feature an operation type depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ExtendedQueryTags,
    InstanceDuplication,
    DataCleanup,
    Migration,
    Export,
    ContentLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub version: SchemaVersion,
    supported: &'static [Capability],
}

const V1_CAPABILITIES: &[Capability] = &[Capability::ExtendedQueryTags];

const V2_CAPABILITIES: &[Capability] = &[
    Capability::ExtendedQueryTags,
    Capability::InstanceDuplication,
    Capability::DataCleanup,
];

const V3_CAPABILITIES: &[Capability] = &[
    Capability::ExtendedQueryTags,
    Capability::InstanceDuplication,
    Capability::DataCleanup,
    Capability::Migration,
    Capability::Export,
];

const V4_CAPABILITIES: &[Capability] = &[
    Capability::ExtendedQueryTags,
    Capability::InstanceDuplication,
    Capability::DataCleanup,
    Capability::Migration,
    Capability::Export,
    Capability::ContentLength,
];

static STRATEGIES: [StoreCapabilities; 4] = [
    StoreCapabilities {
        version: SchemaVersion::V1,
        supported: V1_CAPABILITIES,
    },
    StoreCapabilities {
        version: SchemaVersion::V2,
        supported: V2_CAPABILITIES,
    },
    StoreCapabilities {
        version: SchemaVersion::V3,
        supported: V3_CAPABILITIES,
    },
    StoreCapabilities {
        version: SchemaVersion::V4,
        supported: V4_CAPABILITIES,
    },
];

impl SchemaVersion {
    pub const LATEST: SchemaVersion = SchemaVersion::V4;

    pub fn capabilities(self) -> &'static StoreCapabilities {
        &STRATEGIES[self as usize - 1]
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", u32::from(*self))
    }
}

impl From<SchemaVersion> for u32 {
    fn from(version: SchemaVersion) -> Self {
        version as u32
    }
}

impl TryFrom<u32> for SchemaVersion {
    type Error = OperationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            4 => Ok(Self::V4),
            other => Err(OperationError::ConfigurationError(format!(
                "unknown instance store schema version {other}"
            ))),
        }
    }
}

impl StoreCapabilities {
    pub fn supports(&self, capability: Capability) -> bool {
        self.supported.contains(&capability)
    }

    /// Fail with `UnsupportedOperation` if this schema cannot run the type
    pub fn ensure_supported(&self, operation_type: OperationType) -> OperationResult<()> {
        if self.supports(operation_type.required_capability()) {
            Ok(())
        } else {
            Err(OperationError::UnsupportedOperation {
                operation_type,
                schema_version: self.version.into(),
            })
        }
    }
}

impl OperationType {
    pub fn required_capability(&self) -> Capability {
        match self {
            Self::Reindex => Capability::ExtendedQueryTags,
            Self::Duplicate => Capability::InstanceDuplication,
            Self::Migration => Capability::Migration,
            Self::DataCleanup => Capability::DataCleanup,
            Self::ContentLengthBackfill => Capability::ContentLength,
            Self::Export => Capability::Export,
        }
    }
}
