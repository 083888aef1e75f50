// Operation lifecycle state machine.
//
// The checkpoint state is derived from progress alone; the operation status is
// driven by explicit events from the orchestrator and the client.

pub mod events;
pub mod states;

pub use events::OperationEvent;
pub use states::{CheckpointState, OperationStatus};

use crate::error::{OperationError, OperationResult};

/// Determine the status an event moves an operation to
pub fn determine_target_status(
    current: OperationStatus,
    event: &OperationEvent,
) -> OperationResult<OperationStatus> {
    let target = match (current, event) {
        (OperationStatus::NotStarted, OperationEvent::Start) => OperationStatus::Running,

        (OperationStatus::Running, OperationEvent::Complete) => OperationStatus::Completed,

        (OperationStatus::NotStarted, OperationEvent::Fail(_)) => OperationStatus::Failed,
        (OperationStatus::Running, OperationEvent::Fail(_)) => OperationStatus::Failed,

        (OperationStatus::NotStarted, OperationEvent::Cancel) => OperationStatus::Canceled,
        (OperationStatus::Running, OperationEvent::Cancel) => OperationStatus::Canceled,

        (OperationStatus::Failed, OperationEvent::Resume) => OperationStatus::Running,
        (OperationStatus::Canceled, OperationEvent::Resume) => OperationStatus::Running,

        (from, event) => {
            return Err(OperationError::StateTransitionError(format!(
                "cannot apply {} to operation in status {from}",
                event.event_type()
            )))
        }
    };

    Ok(target)
}
