use std::sync::Arc;

use insight_core::{
    CacheEntry, CacheStore, GenerationRequest, GenerativeModel, JobRequest, ResourceKind,
    TranscriptProvider,
};

use crate::error::JobError;
use crate::{EngineConfig, PromptCatalog};

/// What a finished job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// A new payload was generated and written.
    Generated(CacheEntry),
    /// A usable entry already existed, nothing was generated.
    AlreadyCached,
}

/// Produces the payload for one job and persists it.
///
/// The runner owns the tail of the lease the coordinator took: it is released on
/// success and replaced by a `failed` marker on error.
pub struct JobRunner {
    store: Arc<dyn CacheStore>,
    transcripts: Arc<dyn TranscriptProvider>,
    model: Arc<dyn GenerativeModel>,
    prompts: PromptCatalog,
    config: EngineConfig,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn CacheStore>,
        transcripts: Arc<dyn TranscriptProvider>,
        model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self {
            store,
            transcripts,
            model,
            prompts: PromptCatalog::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: PromptCatalog) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one job to completion and settle its job-status row.
    pub async fn run(&self, request: &JobRequest) -> Result<JobOutcome, JobError> {
        tracing::info!(
            "Starting {} job for {} (model {})",
            request.kind,
            request.resource_key,
            self.model.model_name()
        );

        let result = match request.kind {
            ResourceKind::VideoSummary => self.run_video_summary(request).await,
            ResourceKind::TradingInsight => self.run_trading_insight(request).await,
        };

        match &result {
            Ok(outcome) => {
                match outcome {
                    JobOutcome::Generated(entry) => tracing::info!(
                        "Job {} stored {} bytes",
                        request,
                        entry.payload.len()
                    ),
                    JobOutcome::AlreadyCached => {
                        tracing::info!("Job {} skipped, entry already cached", request)
                    }
                }
                if let Err(e) = self
                    .store
                    .release_lease(request.kind, &request.resource_key)
                    .await
                {
                    tracing::warn!("Failed to release lease for {}: {}", request, e);
                }
            }
            Err(e) => {
                tracing::error!("Job {} failed: {}", request, e);
                if let Err(store_err) = self
                    .store
                    .mark_failed(request.kind, &request.resource_key, &e.to_string())
                    .await
                {
                    tracing::error!("Could not record failure for {}: {}", request, store_err);
                }
            }
        }

        result
    }

    /// Run `request` on its own task so a panic cannot take the caller down.
    ///
    /// A job that panics or is cancelled never reaches the bookkeeping in
    /// [`JobRunner::run`], so it is marked `failed` here instead of leaving a
    /// `running` lease behind.
    pub async fn run_detached(
        self: Arc<Self>,
        request: JobRequest,
    ) -> Result<JobOutcome, JobError> {
        let runner = self.clone();
        let job = request.clone();
        match tokio::spawn(async move { runner.run(&job).await }).await {
            Ok(result) => result,
            Err(e) => {
                let err = JobError::Aborted(e.to_string());
                tracing::error!("Job {} failed: {}", request, err);
                if let Err(store_err) = self
                    .store
                    .mark_failed(request.kind, &request.resource_key, &err.to_string())
                    .await
                {
                    tracing::error!("Could not record failure for {}: {}", request, store_err);
                }
                Err(err)
            }
        }
    }

    async fn run_video_summary(&self, request: &JobRequest) -> Result<JobOutcome, JobError> {
        let video_id = request.resource_key.as_str();

        if self
            .store
            .get_any(ResourceKind::VideoSummary, video_id)
            .await?
            .is_some()
        {
            return Ok(JobOutcome::AlreadyCached);
        }

        let transcript = match self.store.get_transcript(video_id).await? {
            Some(entry) => {
                tracing::debug!("Using cached transcript for {}", video_id);
                entry.content
            }
            None => {
                let text = self
                    .transcripts
                    .fetch_transcript(video_id)
                    .await
                    .map_err(JobError::Transcript)?
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| JobError::TranscriptUnavailable(video_id.to_string()))?;

                if !self
                    .store
                    .insert_transcript_if_absent(video_id, &text)
                    .await?
                {
                    tracing::debug!("Transcript for {} was stored concurrently", video_id);
                }
                text
            }
        };

        let prompt = self
            .prompts
            .video_summary(request.context.channel_name.as_deref(), &transcript);
        let summary = self
            .model
            .generate(&GenerationRequest::new(prompt))
            .await
            .map_err(JobError::Generation)?;

        let entry = self
            .store
            .upsert(ResourceKind::VideoSummary, video_id, &summary)
            .await?;
        Ok(JobOutcome::Generated(entry))
    }

    async fn run_trading_insight(&self, request: &JobRequest) -> Result<JobOutcome, JobError> {
        let symbol = request.resource_key.as_str();

        // The coordinator's check and this job are not ordered; another job may have
        // finished in between.
        if self
            .store
            .get_fresh(ResourceKind::TradingInsight, symbol, self.config.insight_ttl)
            .await?
            .is_some()
        {
            return Ok(JobOutcome::AlreadyCached);
        }

        let prompt = self.prompts.trading_insight(symbol);
        let insight = self
            .model
            .generate(&GenerationRequest::new(prompt).with_grounding())
            .await
            .map_err(JobError::Generation)?;

        let entry = self
            .store
            .upsert(ResourceKind::TradingInsight, symbol, &insight)
            .await?;
        Ok(JobOutcome::Generated(entry))
    }
}
