//! # Orchestration
//!
//! The batching core: planning watermark batches, running them with bounded
//! concurrency, retrying failed batches and folding confirmed progress into
//! the checkpoint.

pub mod batch_planner;
pub mod orchestrator;
pub mod retry;
pub mod task_batch;

pub use batch_planner::BatchPlanner;
pub use orchestrator::{BatchOrchestrator, OrchestrationOutcome};
pub use retry::RetryPolicy;
pub use task_batch::TaskBatch;
