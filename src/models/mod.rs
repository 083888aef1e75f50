//! # Data Model
//!
//! Watermark ranges, checkpoints, operation identity/inputs and the instance
//! identifiers exchanged with the instance store.

pub mod checkpoint;
pub mod instance;
pub mod operation;
pub mod watermark_range;

pub use checkpoint::OperationCheckpoint;
pub use instance::{InstanceFilter, InstanceIdentifier};
pub use operation::{OperationId, OperationInput, OperationType};
pub use watermark_range::WatermarkRange;

/// One unit of planned work: a range plus the parallelism used to process it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub range: WatermarkRange,
    pub thread_count: i32,
}
