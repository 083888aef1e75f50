//! Identity and time sources injected into the client.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::OperationId;

pub trait OperationIdGenerator: Send + Sync {
    fn next_id(&self) -> OperationId;
}

/// Random v4 identifiers
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl OperationIdGenerator for RandomIdGenerator {
    fn next_id(&self) -> OperationId {
        OperationId::from_uuid(Uuid::new_v4())
    }
}

/// Predictable identifiers: `00000000-0000-0000-0000-000000000001`, ...
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl OperationIdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> OperationId {
        let value = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        OperationId::from_uuid(Uuid::from_u128(u128::from(value)))
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
