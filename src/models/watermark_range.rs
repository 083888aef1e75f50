//! # Watermark Range
//!
//! Immutable inclusive interval over the watermark sequence. Ranges are built
//! per batch by the planner and folded into a checkpoint's completed range as
//! batches finish.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OperationError, OperationResult};

/// Inclusive `[start, end]` interval with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWatermarkRange")]
pub struct WatermarkRange {
    start: i64,
    end: i64,
}

#[derive(Deserialize)]
struct RawWatermarkRange {
    start: i64,
    end: i64,
}

impl TryFrom<RawWatermarkRange> for WatermarkRange {
    type Error = OperationError;

    fn try_from(raw: RawWatermarkRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl WatermarkRange {
    pub fn new(start: i64, end: i64) -> OperationResult<Self> {
        if start > end {
            return Err(OperationError::invalid_argument(format!(
                "range start ({start}) must not exceed end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Caller guarantees `start <= end`
    pub(crate) fn from_ordered(start: i64, end: i64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Single-watermark range
    pub fn single(watermark: i64) -> Self {
        Self {
            start: watermark,
            end: watermark,
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Number of watermarks covered
    pub fn len(&self) -> u64 {
        self.end.abs_diff(self.start).saturating_add(1)
    }

    /// Always false, a range covers at least one watermark
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, watermark: i64) -> bool {
        self.start <= watermark && watermark <= self.end
    }

    pub fn overlaps(&self, other: &WatermarkRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Whether `other` begins immediately after this range ends or vice versa
    pub fn is_adjacent_to(&self, other: &WatermarkRange) -> bool {
        self.end.checked_add(1) == Some(other.start) || other.end.checked_add(1) == Some(self.start)
    }

    /// Merge two adjacent ranges into `[min start, max end]`.
    ///
    /// Ranges separated by a gap cannot merge. Overlapping ranges are rejected
    /// as well: a sweep only ever appends the next unprocessed range, so an
    /// overlap means the same watermarks were handed out twice.
    pub fn combine(&self, other: &WatermarkRange) -> OperationResult<WatermarkRange> {
        if self.overlaps(other) {
            return Err(OperationError::invalid_argument(format!(
                "overlapping ranges cannot merge: {self} and {other}"
            )));
        }
        if !self.is_adjacent_to(other) {
            return Err(OperationError::invalid_argument(format!(
                "non-contiguous ranges cannot merge: {self} and {other}"
            )));
        }

        Ok(WatermarkRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        })
    }
}

impl fmt::Display for WatermarkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: i64, end: i64) -> WatermarkRange {
        WatermarkRange::new(start, end).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        let result = WatermarkRange::new(5, 4);
        assert!(matches!(result, Err(OperationError::InvalidArgument(_))));
        assert!(WatermarkRange::new(4, 4).is_ok());
    }

    #[test]
    fn test_combine_adjacent_ranges() {
        assert_eq!(range(1, 2).combine(&range(3, 4)).unwrap(), range(1, 4));
        assert_eq!(range(1, 100).combine(&range(101, 200)).unwrap(), range(1, 200));
        assert_eq!(range(3, 4).combine(&range(1, 2)).unwrap(), range(1, 4));
    }

    #[test]
    fn test_combine_gap_fails() {
        let err = range(1, 3).combine(&range(5, 6)).unwrap_err();
        assert!(err.to_string().contains("non-contiguous"));
        assert!(range(5, 6).combine(&range(1, 3)).is_err());
    }

    #[test]
    fn test_combine_overlap_fails() {
        let err = range(1, 3).combine(&range(2, 4)).unwrap_err();
        assert!(err.to_string().contains("overlapping"));
        assert!(range(1, 3).combine(&range(1, 3)).is_err());
        assert!(range(1, 10).combine(&range(4, 5)).is_err());
    }

    #[test]
    fn test_len_and_contains() {
        let r = range(10, 19);
        assert_eq!(r.len(), 10);
        assert!(r.contains(10));
        assert!(r.contains(19));
        assert!(!r.contains(20));
        assert_eq!(WatermarkRange::single(7).len(), 1);
    }

    #[test]
    fn test_adjacency_at_i64_max_does_not_overflow() {
        let top = range(i64::MAX - 1, i64::MAX);
        assert!(!top.is_adjacent_to(&range(1, 2)));
    }

    #[test]
    fn test_deserialize_validates_bounds() {
        let ok: WatermarkRange = serde_json::from_str(r#"{"start":1,"end":5}"#).unwrap();
        assert_eq!(ok, range(1, 5));

        let bad = serde_json::from_str::<WatermarkRange>(r#"{"start":9,"end":5}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(range(1, 20).to_string(), "[1, 20]");
    }
}
