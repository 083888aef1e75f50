//! # Operation Checkpoint
//!
//! The persisted, resumable state of one long-running operation. A checkpoint
//! always means "every watermark up to `completed.end` is done"; it is only
//! mutated by the orchestrator, after a batch has been confirmed.
//!
//! ```text
//! Created (completed = None) ──▶ InProgress (end < target) ──▶ Complete (end ≥ target)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::{OperationId, OperationInput, OperationType};
use super::watermark_range::WatermarkRange;
use crate::config::BatchingConfig;
use crate::constants::FIRST_WATERMARK;
use crate::error::{OperationError, OperationResult};
use crate::state_machine::CheckpointState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCheckpoint {
    pub operation_id: OperationId,
    pub input: OperationInput,
    pub batching: BatchingConfig,
    completed: Option<WatermarkRange>,
    created_time: Option<DateTime<Utc>>,
    /// Upper bound snapshotted when the sweep first ran
    target_max_watermark: Option<i64>,
}

impl OperationCheckpoint {
    pub fn new(
        operation_id: OperationId,
        input: OperationInput,
        batching: BatchingConfig,
        created_time: DateTime<Utc>,
    ) -> Self {
        Self {
            operation_id,
            input,
            batching,
            completed: None,
            created_time: Some(created_time),
            target_max_watermark: None,
        }
    }

    pub fn operation_type(&self) -> OperationType {
        self.input.operation_type()
    }

    pub fn completed(&self) -> Option<WatermarkRange> {
        self.completed
    }

    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        self.created_time
    }

    pub fn target_max_watermark(&self) -> Option<i64> {
        self.target_max_watermark
    }

    pub fn resource_ids(&self) -> Vec<String> {
        self.input.resource_ids()
    }

    /// Record the sweep's upper bound. The first snapshot wins so that a
    /// resumed operation keeps the target it started with.
    pub fn snapshot_target(&mut self, max_watermark: i64) -> i64 {
        *self.target_max_watermark.get_or_insert(max_watermark)
    }

    /// First watermark not yet confirmed, `None` once `i64::MAX` is confirmed
    pub fn next_watermark(&self) -> Option<i64> {
        match self.completed {
            None => Some(FIRST_WATERMARK),
            Some(completed) => completed.end().checked_add(1),
        }
    }

    /// Watermarks left to process, `None` once the target is covered or
    /// before a target has been snapshotted
    pub fn remaining_range(&self) -> Option<WatermarkRange> {
        let target = self.target_max_watermark?;
        WatermarkRange::new(self.next_watermark()?, target).ok()
    }

    pub fn is_complete(&self) -> bool {
        self.state() == CheckpointState::Complete
    }

    pub fn state(&self) -> CheckpointState {
        let covered = self
            .target_max_watermark
            .is_some_and(|target| self.next_watermark().map_or(true, |next| next > target));

        match self.completed {
            _ if covered => CheckpointState::Complete,
            None => CheckpointState::Created,
            Some(_) => CheckpointState::InProgress,
        }
    }

    /// Fold a confirmed batch into the completed range.
    ///
    /// The batch must start right after `completed.end`; anything else means
    /// the host replayed or reordered a step and is never retried.
    pub fn advance_completed(&mut self, batch: WatermarkRange) -> OperationResult<WatermarkRange> {
        let advanced = match self.completed {
            None => batch,
            Some(completed) => {
                if completed.end().checked_add(1) != Some(batch.start()) {
                    return Err(OperationError::NonContiguousCheckpoint { completed, batch });
                }
                completed
                    .combine(&batch)
                    .map_err(|_| OperationError::NonContiguousCheckpoint { completed, batch })?
            }
        };

        self.completed = Some(advanced);
        Ok(advanced)
    }

    /// Percent of the sweep confirmed complete, floored.
    ///
    /// `completed.end == 1` reports 100 regardless of start. The denominator
    /// is the snapshotted target when known, falling back to `completed.end`
    /// for checkpoints written before a target existed.
    pub fn percent_complete(&self) -> u8 {
        let Some(completed) = self.completed else {
            return 0;
        };
        if completed.end() == 1 {
            return 100;
        }

        let denominator = self.target_max_watermark.unwrap_or(completed.end());
        if denominator <= 0 {
            return 100;
        }

        let done = i128::from(completed.end()) - i128::from(completed.start()) + 1;
        let percent = done * 100 / i128::from(denominator);
        percent.clamp(0, 100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn checkpoint() -> OperationCheckpoint {
        OperationCheckpoint::new(
            OperationId::from_uuid(Uuid::new_v4()),
            OperationInput::Duplicate,
            BatchingConfig::default(),
            Utc::now(),
        )
    }

    fn range(start: i64, end: i64) -> WatermarkRange {
        WatermarkRange::new(start, end).unwrap()
    }

    #[test]
    fn test_new_checkpoint_is_created_and_empty() {
        let cp = checkpoint();
        assert_eq!(cp.completed(), None);
        assert_eq!(cp.state(), CheckpointState::Created);
        assert_eq!(cp.percent_complete(), 0);
        assert_eq!(cp.next_watermark(), Some(1));
        assert!(cp.created_time().is_some());
    }

    #[test]
    fn test_advance_completed_grows_range() {
        let mut cp = checkpoint();
        cp.snapshot_target(20);

        assert_eq!(cp.advance_completed(range(1, 5)).unwrap(), range(1, 5));
        assert_eq!(cp.state(), CheckpointState::InProgress);
        assert_eq!(cp.advance_completed(range(6, 10)).unwrap(), range(1, 10));
        assert_eq!(cp.next_watermark(), Some(11));
        assert_eq!(cp.remaining_range(), Some(range(11, 20)));
    }

    #[test]
    fn test_advance_completed_rejects_gap_and_replay() {
        let mut cp = checkpoint();
        cp.advance_completed(range(1, 5)).unwrap();

        let gap = cp.advance_completed(range(7, 9)).unwrap_err();
        assert!(matches!(gap, OperationError::NonContiguousCheckpoint { .. }));

        let replay = cp.advance_completed(range(1, 5)).unwrap_err();
        assert!(matches!(replay, OperationError::NonContiguousCheckpoint { .. }));

        assert_eq!(cp.completed(), Some(range(1, 5)));
    }

    #[test]
    fn test_complete_once_target_covered() {
        let mut cp = checkpoint();
        cp.snapshot_target(10);
        cp.advance_completed(range(1, 10)).unwrap();

        assert!(cp.is_complete());
        assert_eq!(cp.remaining_range(), None);
        assert_eq!(cp.percent_complete(), 100);
    }

    #[test]
    fn test_complete_when_sweep_reaches_max_watermark() {
        let mut cp = checkpoint();
        cp.snapshot_target(i64::MAX);
        cp.advance_completed(range(1, i64::MAX)).unwrap();

        assert_eq!(cp.next_watermark(), None);
        assert!(cp.is_complete());
        assert_eq!(cp.remaining_range(), None);
        assert_eq!(cp.percent_complete(), 100);

        let past_end = cp.advance_completed(range(i64::MAX, i64::MAX)).unwrap_err();
        assert!(matches!(past_end, OperationError::NonContiguousCheckpoint { .. }));
        assert_eq!(cp.completed(), Some(range(1, i64::MAX)));
    }

    #[test]
    fn test_empty_store_is_complete_immediately() {
        let mut cp = checkpoint();
        cp.snapshot_target(0);
        assert!(cp.is_complete());
        assert_eq!(cp.remaining_range(), None);
    }

    #[test]
    fn test_snapshot_target_keeps_first_value() {
        let mut cp = checkpoint();
        assert_eq!(cp.snapshot_target(20), 20);
        assert_eq!(cp.snapshot_target(35), 20);
        assert_eq!(cp.target_max_watermark(), Some(20));
    }

    #[test]
    fn test_percent_complete_single_item_special_case() {
        let mut cp = checkpoint();
        cp.advance_completed(range(1, 1)).unwrap();
        assert_eq!(cp.percent_complete(), 100);
    }

    #[test]
    fn test_percent_complete_against_target() {
        let mut cp = checkpoint();
        cp.snapshot_target(20);
        cp.advance_completed(range(1, 5)).unwrap();
        assert_eq!(cp.percent_complete(), 25);
        cp.advance_completed(range(6, 7)).unwrap();
        assert_eq!(cp.percent_complete(), 35);
    }

    #[test]
    fn test_percent_complete_without_target_uses_completed_end() {
        let mut cp = checkpoint();
        cp.advance_completed(range(3, 10)).unwrap();
        // (10 - 3 + 1) / 10
        assert_eq!(cp.percent_complete(), 80);
    }

    #[test]
    fn test_percent_complete_is_monotonic() {
        let mut cp = checkpoint();
        cp.snapshot_target(97);
        let mut last = cp.percent_complete();
        let mut start = 1;
        while start <= 97 {
            let end = (start + 6).min(97);
            cp.advance_completed(range(start, end)).unwrap();
            let percent = cp.percent_complete();
            assert!(percent >= last, "{percent} < {last}");
            last = percent;
            start = end + 1;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_checkpoint_serde_preserves_progress() {
        let mut cp = checkpoint();
        cp.snapshot_target(50);
        cp.advance_completed(range(1, 25)).unwrap();

        let json = serde_json::to_string(&cp).unwrap();
        let restored: OperationCheckpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cp);
        assert_eq!(restored.percent_complete(), 50);
    }
}
