mod common;

use common::*;
use dicom_operations::config::BatchingConfig;
use dicom_operations::models::{OperationCheckpoint, OperationId, OperationInput, WatermarkRange};
use dicom_operations::orchestration::BatchPlanner;
use proptest::prelude::*;

proptest! {
    /// Property: adjacent ranges merge the same way in either order
    #[test]
    fn combine_is_commutative_for_adjacent_ranges((a, b) in adjacent_ranges_strategy()) {
        let ab = a.combine(&b).unwrap();
        let ba = b.combine(&a).unwrap();
        prop_assert_eq!(ab, ba);
        prop_assert_eq!(ab.start(), a.start().min(b.start()));
        prop_assert_eq!(ab.end(), a.end().max(b.end()));
    }

    /// Property: a gap between ranges is never bridged
    #[test]
    fn combine_rejects_gaps((a, b) in gapped_ranges_strategy()) {
        prop_assert!(a.combine(&b).is_err());
        prop_assert!(b.combine(&a).is_err());
    }

    /// Property: overlapping ranges are rejected rather than merged
    #[test]
    fn combine_rejects_overlaps((a, b) in overlapping_ranges_strategy()) {
        prop_assert!(a.combine(&b).is_err());
    }

    /// Property: folding planned batches into a checkpoint reproduces the
    /// planned range and never lowers the reported progress
    #[test]
    fn checkpoint_folds_planned_batches(
        target in 1i64..5_000,
        batch_size in 1u32..500,
    ) {
        let total = WatermarkRange::new(1, target).unwrap();
        let batches = BatchPlanner::plan(total, batch_size, u32::MAX).unwrap();

        let mut checkpoint = OperationCheckpoint::new(
            OperationId::from_uuid(uuid::Uuid::new_v4()),
            OperationInput::Duplicate,
            BatchingConfig::default(),
            chrono::Utc::now(),
        );
        checkpoint.snapshot_target(target);

        let mut last_percent = checkpoint.percent_complete();
        for batch in batches {
            checkpoint.advance_completed(batch).unwrap();
            let percent = checkpoint.percent_complete();
            prop_assert!(percent >= last_percent);
            last_percent = percent;
        }

        prop_assert_eq!(checkpoint.completed(), Some(total));
        prop_assert!(checkpoint.is_complete());
        prop_assert_eq!(last_percent, 100);
    }

    /// Property: checkpoints survive serialization unchanged
    #[test]
    fn checkpoint_json_preserves_progress(range in watermark_range_strategy()) {
        let mut checkpoint = OperationCheckpoint::new(
            OperationId::from_uuid(uuid::Uuid::new_v4()),
            OperationInput::Reindex { query_tag_keys: vec![1] },
            BatchingConfig::default(),
            chrono::Utc::now(),
        );
        checkpoint.advance_completed(range).unwrap();

        let json = serde_json::to_string(&checkpoint).unwrap();
        let restored: OperationCheckpoint = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(restored.percent_complete(), checkpoint.percent_complete());
        prop_assert_eq!(restored, checkpoint);
    }
}

#[test]
fn test_inverted_range_is_rejected_on_deserialize() {
    let result: Result<WatermarkRange, _> = serde_json::from_str(r#"{"start": 9, "end": 3}"#);
    assert!(result.is_err());
}
