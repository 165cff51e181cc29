use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use insight_core::{
    CacheEntry, CacheStore, Clock, JobState, ResourceKind, StoreError, StoreResult, SystemClock,
    TranscriptEntry,
};

type Key = (ResourceKind, String);

/// In-process `CacheStore`. Each map entry is locked independently, which gives the
/// same single-row atomicity as the relational store.
pub struct MemoryCacheStore {
    entries: DashMap<Key, CacheEntry>,
    transcripts: DashMap<String, TranscriptEntry>,
    jobs: DashMap<Key, JobState>,
    clock: Arc<dyn Clock>,
    offline: AtomicBool,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            transcripts: DashMap::new(),
            jobs: DashMap::new(),
            clock,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    fn key(kind: ResourceKind, key: &str) -> Key {
        (kind, key.to_string())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get_any(&self, kind: ResourceKind, key: &str) -> StoreResult<Option<CacheEntry>> {
        self.check_online()?;
        Ok(self
            .entries
            .get(&Self::key(kind, key))
            .map(|e| e.value().clone()))
    }

    async fn get_fresh(
        &self,
        kind: ResourceKind,
        key: &str,
        max_age: Duration,
    ) -> StoreResult<Option<CacheEntry>> {
        self.check_online()?;
        let now = self.clock.now();
        Ok(self
            .entries
            .get(&Self::key(kind, key))
            .filter(|e| now - e.generated_at <= max_age)
            .map(|e| e.value().clone()))
    }

    async fn get_many(&self, kind: ResourceKind, keys: &[String]) -> StoreResult<Vec<CacheEntry>> {
        self.check_online()?;
        Ok(keys
            .iter()
            .filter_map(|k| self.entries.get(&Self::key(kind, k)).map(|e| e.value().clone()))
            .collect())
    }

    async fn upsert(&self, kind: ResourceKind, key: &str, payload: &str) -> StoreResult<CacheEntry> {
        self.check_online()?;
        let entry = CacheEntry {
            key: key.to_string(),
            payload: payload.to_string(),
            generated_at: self.clock.now(),
        };
        self.entries.insert(Self::key(kind, key), entry.clone());
        Ok(entry)
    }

    async fn get_transcript(&self, video_id: &str) -> StoreResult<Option<TranscriptEntry>> {
        self.check_online()?;
        Ok(self.transcripts.get(video_id).map(|t| t.value().clone()))
    }

    async fn insert_transcript_if_absent(
        &self,
        video_id: &str,
        content: &str,
    ) -> StoreResult<bool> {
        self.check_online()?;
        match self.transcripts.entry(video_id.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(TranscriptEntry {
                    video_id: video_id.to_string(),
                    content: content.to_string(),
                    fetched_at: self.clock.now(),
                });
                Ok(true)
            }
        }
    }

    async fn try_acquire_lease(
        &self,
        kind: ResourceKind,
        key: &str,
        lease_ttl: Duration,
    ) -> StoreResult<bool> {
        self.check_online()?;
        let now = self.clock.now();
        let running = JobState::Running { started_at: now };

        match self.jobs.entry(Self::key(kind, key)) {
            Entry::Vacant(slot) => {
                slot.insert(running);
                Ok(true)
            }
            Entry::Occupied(mut slot) => {
                let held = matches!(
                    slot.get(),
                    JobState::Running { started_at } if now - *started_at <= lease_ttl
                );
                if held {
                    return Ok(false);
                }
                slot.insert(running);
                Ok(true)
            }
        }
    }

    async fn release_lease(&self, kind: ResourceKind, key: &str) -> StoreResult<()> {
        self.check_online()?;
        self.jobs.remove(&Self::key(kind, key));
        Ok(())
    }

    async fn mark_failed(&self, kind: ResourceKind, key: &str, detail: &str) -> StoreResult<()> {
        self.check_online()?;
        self.jobs.insert(
            Self::key(kind, key),
            JobState::Failed {
                detail: detail.to_string(),
                failed_at: self.clock.now(),
            },
        );
        Ok(())
    }

    async fn job_state(&self, kind: ResourceKind, key: &str) -> StoreResult<Option<JobState>> {
        self.check_online()?;
        Ok(self.jobs.get(&Self::key(kind, key)).map(|j| j.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use insight_core::ManualClock;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_upsert_and_freshness() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = MemoryCacheStore::with_clock(clock.clone());
        let kind = ResourceKind::TradingInsight;

        store.upsert(kind, "MSFT", "one").await.unwrap();
        store.upsert(kind, "MSFT", "two").await.unwrap();
        assert_eq!(store.get_any(kind, "MSFT").await.unwrap().unwrap().payload, "two");

        clock.advance(Duration::hours(49));
        assert!(store
            .get_fresh(kind, "MSFT", Duration::hours(48))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_lease_has_single_winner() {
        let store = Arc::new(MemoryCacheStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .try_acquire_lease(ResourceKind::TradingInsight, "GME", Duration::minutes(15))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = MemoryCacheStore::new();
        store.set_offline(true);
        let err = assert_err!(store.get_any(ResourceKind::VideoSummary, "vid").await);
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_offline(false);
        let entry = assert_ok!(store.get_any(ResourceKind::VideoSummary, "vid").await);
        assert!(entry.is_none());
    }
}
