use proptest::prelude::*;

use dicom_operations::models::WatermarkRange;

pub fn watermark_range_strategy() -> impl Strategy<Value = WatermarkRange> {
    (1i64..1_000_000, 0i64..10_000)
        .prop_map(|(start, len)| WatermarkRange::new(start, start + len).unwrap())
}

/// Two ranges where the second starts right after the first
pub fn adjacent_ranges_strategy() -> impl Strategy<Value = (WatermarkRange, WatermarkRange)> {
    (watermark_range_strategy(), 0i64..10_000).prop_map(|(first, len)| {
        let second = WatermarkRange::new(first.end() + 1, first.end() + 1 + len).unwrap();
        (first, second)
    })
}

/// Two ranges separated by at least one unprocessed watermark
pub fn gapped_ranges_strategy() -> impl Strategy<Value = (WatermarkRange, WatermarkRange)> {
    (watermark_range_strategy(), 2i64..1_000, 0i64..1_000).prop_map(|(first, gap, len)| {
        let start = first.end() + gap;
        (first, WatermarkRange::new(start, start + len).unwrap())
    })
}

/// Two ranges sharing at least one watermark
pub fn overlapping_ranges_strategy() -> impl Strategy<Value = (WatermarkRange, WatermarkRange)> {
    (watermark_range_strategy(), 0i64..10_000).prop_map(|(first, extra)| {
        let overlap_start = first.start() + (first.end() - first.start()) / 2;
        (
            first,
            WatermarkRange::new(overlap_start, first.end() + extra).unwrap(),
        )
    })
}
