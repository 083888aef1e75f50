use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use dicom_operations::models::{InstanceFilter, InstanceIdentifier, WatermarkRange};
use dicom_operations::registry::ItemProcessor;
use dicom_operations::store::InstanceStore;

/// Instance store backed by a sorted map of watermark -> creation time
#[derive(Default)]
pub struct InMemoryInstanceStore {
    instances: Mutex<BTreeMap<i64, DateTime<Utc>>>,
    failing_identifier_queries: AtomicU32,
}

impl InMemoryInstanceStore {
    /// One instance per watermark, created an hour apart from 2024-01-01
    pub fn with_watermarks(watermarks: impl IntoIterator<Item = i64>) -> Self {
        let store = Self::default();
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        {
            let mut instances = store.instances.lock();
            for watermark in watermarks {
                instances.insert(watermark, origin + Duration::hours(watermark));
            }
        }
        store
    }

    /// Instances added after an operation started must not extend its target
    pub fn add_instance(&self, watermark: i64) {
        self.instances.lock().insert(watermark, Utc::now());
    }

    /// Fail the next `count` identifier queries
    pub fn fail_next_identifier_queries(&self, count: u32) {
        self.failing_identifier_queries
            .store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn get_max_watermark(&self, filter: &InstanceFilter) -> anyhow::Result<Option<i64>> {
        Ok(self
            .instances
            .lock()
            .iter()
            .filter(|(_, created)| filter.matches(**created))
            .map(|(watermark, _)| *watermark)
            .next_back())
    }

    async fn get_instance_identifiers(
        &self,
        filter: &InstanceFilter,
        range: WatermarkRange,
    ) -> anyhow::Result<Vec<InstanceIdentifier>> {
        let should_fail = self
            .failing_identifier_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            anyhow::bail!("instance query timed out for {range}");
        }

        Ok(self
            .instances
            .lock()
            .range(range.start()..=range.end())
            .filter(|(_, created)| filter.matches(**created))
            .map(|(watermark, _)| {
                InstanceIdentifier::new(
                    "1.2.840.10008.1",
                    format!("1.2.840.10008.1.{}", watermark / 10),
                    format!("1.2.840.10008.1.{}.{watermark}", watermark / 10),
                    *watermark,
                )
            })
            .collect())
    }
}

/// Item processor that records every call and fails on demand
#[derive(Default)]
pub struct RecordingProcessor {
    calls: Mutex<HashMap<i64, u32>>,
    fail_once: Mutex<HashSet<i64>>,
    always_fail: Mutex<HashSet<i64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Option<Semaphore>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call blocks until [`RecordingProcessor::open_gate`]
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn fail_first_call_for(self, watermarks: impl IntoIterator<Item = i64>) -> Self {
        self.fail_once.lock().extend(watermarks);
        self
    }

    pub fn always_fail_for(self, watermarks: impl IntoIterator<Item = i64>) -> Self {
        self.always_fail.lock().extend(watermarks);
        self
    }

    pub fn heal(&self) {
        self.always_fail.lock().clear();
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(10_000);
        }
    }

    pub fn calls_for(&self, watermark: i64) -> u32 {
        self.calls.lock().get(&watermark).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().values().sum()
    }

    pub fn processed_watermarks(&self) -> Vec<i64> {
        let mut watermarks: Vec<i64> = self.calls.lock().keys().copied().collect();
        watermarks.sort_unstable();
        watermarks
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemProcessor for RecordingProcessor {
    async fn process(
        &self,
        identifier: &InstanceIdentifier,
        _cancellation: CancellationToken,
    ) -> anyhow::Result<()> {
        let watermark = identifier.watermark;
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(watermark).or_default();
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.always_fail.lock().contains(&watermark) {
            anyhow::bail!("blob copy failed for {identifier}");
        }
        if call == 1 && self.fail_once.lock().contains(&watermark) {
            anyhow::bail!("transient storage error for {identifier}");
        }
        Ok(())
    }
}
