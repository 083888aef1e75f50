//! Read-side contract of the instance store.

use async_trait::async_trait;

use crate::models::{InstanceFilter, InstanceIdentifier, WatermarkRange};

/// Source of watermark-ordered instances for a sweep.
///
/// Implementations are shared by every item task of a wave and must tolerate
/// concurrent calls.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Highest watermark currently assigned among instances matching the
    /// filter, `None` when the store holds no matching instance.
    async fn get_max_watermark(&self, filter: &InstanceFilter) -> anyhow::Result<Option<i64>>;

    /// Identifiers of matching instances whose watermark falls inside `range`,
    /// ordered by ascending watermark.
    async fn get_instance_identifiers(
        &self,
        filter: &InstanceFilter,
        range: WatermarkRange,
    ) -> anyhow::Result<Vec<InstanceIdentifier>>;
}
