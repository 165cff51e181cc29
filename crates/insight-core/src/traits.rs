use async_trait::async_trait;
use chrono::Duration;

use crate::{
    CacheEntry, FreshnessPolicy, JobRequest, JobState, ProviderError, ResourceKind, StoreResult,
    TranscriptEntry, TriggerError,
};

/// Durable key-value layer for generated payloads, transcripts and job book-keeping.
///
/// Every method is atomic at the single-row level. Nothing here spans rows.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Entry for `key` regardless of its age.
    async fn get_any(&self, kind: ResourceKind, key: &str) -> StoreResult<Option<CacheEntry>>;

    /// Entry for `key` only if `now - generated_at <= max_age`. Stale is reported as absent.
    async fn get_fresh(
        &self,
        kind: ResourceKind,
        key: &str,
        max_age: Duration,
    ) -> StoreResult<Option<CacheEntry>>;

    /// All entries among `keys` that exist, in no particular order.
    async fn get_many(&self, kind: ResourceKind, keys: &[String]) -> StoreResult<Vec<CacheEntry>>;

    /// Insert or fully replace the entry for `key`, stamping it with the current time.
    async fn upsert(&self, kind: ResourceKind, key: &str, payload: &str) -> StoreResult<CacheEntry>;

    async fn get_transcript(&self, video_id: &str) -> StoreResult<Option<TranscriptEntry>>;

    /// Store a transcript unless one already exists. Returns whether a row was written.
    async fn insert_transcript_if_absent(&self, video_id: &str, content: &str)
        -> StoreResult<bool>;

    /// Atomically mark a job for `key` as running.
    ///
    /// Succeeds when no job is recorded, the last job failed, or the running
    /// marker is older than `lease_ttl`.
    async fn try_acquire_lease(
        &self,
        kind: ResourceKind,
        key: &str,
        lease_ttl: Duration,
    ) -> StoreResult<bool>;

    /// Drop the running marker for `key`.
    async fn release_lease(&self, kind: ResourceKind, key: &str) -> StoreResult<()>;

    /// Record that the job for `key` failed, replacing any running marker.
    async fn mark_failed(&self, kind: ResourceKind, key: &str, detail: &str) -> StoreResult<()>;

    async fn job_state(&self, kind: ResourceKind, key: &str) -> StoreResult<Option<JobState>>;

    /// Lookup honouring a freshness policy.
    async fn get_with_policy(
        &self,
        kind: ResourceKind,
        key: &str,
        policy: FreshnessPolicy,
    ) -> StoreResult<Option<CacheEntry>> {
        match policy {
            FreshnessPolicy::Forever => self.get_any(kind, key).await,
            FreshnessPolicy::MaxAge(max_age) => self.get_fresh(kind, key, max_age).await,
        }
    }
}

/// Fetches raw transcripts for videos.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// `Ok(None)` means no transcript is available for this video.
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>, ProviderError>;
}

/// Input to a generative model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Ask the model to ground its answer with web search when it can.
    pub grounding: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            grounding: false,
        }
    }

    pub fn with_grounding(mut self) -> Self {
        self.grounding = true;
        self
    }
}

/// Opaque text generator. Latency is unbounded and any failure is an error.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError>;

    fn model_name(&self) -> &str;
}

/// Starts a job without waiting for it to finish.
///
/// `Ok` means the job was accepted for processing, not that it completed.
#[async_trait]
pub trait JobTrigger: Send + Sync {
    async fn dispatch(&self, request: JobRequest) -> Result<(), TriggerError>;

    fn name(&self) -> &'static str;
}
