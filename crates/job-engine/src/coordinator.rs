use std::sync::Arc;

use insight_core::{
    CacheStore, CheckOutcome, JobRequest, JobState, JobTrigger, ResourceKind, ResourceStatus,
};

use crate::error::CoordinatorError;
use crate::{normalize_key, EngineConfig};

/// Answers "give me X or start producing it" and "is X ready yet".
///
/// Holds no state of its own; every decision is made against the store, so any
/// number of coordinators may serve the same keys.
#[derive(Clone)]
pub struct RequestCoordinator {
    store: Arc<dyn CacheStore>,
    trigger: Arc<dyn JobTrigger>,
    config: EngineConfig,
}

impl RequestCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, trigger: Arc<dyn JobTrigger>) -> Self {
        Self {
            store,
            trigger,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn trigger_name(&self) -> &'static str {
        self.trigger.name()
    }

    /// Serve a fresh entry, or make sure exactly one job is producing it.
    ///
    /// Concurrent calls for the same missing key race on the job lease; only the
    /// winner dispatches, the rest report `Pending`.
    pub async fn check_or_start(
        &self,
        mut request: JobRequest,
    ) -> Result<CheckOutcome, CoordinatorError> {
        let key = normalize_key(request.kind, &request.resource_key).ok_or_else(|| {
            CoordinatorError::InvalidRequest(format!("missing {} key", request.kind))
        })?;
        request.resource_key = key;
        let kind = request.kind;

        if let Some(entry) = self
            .store
            .get_with_policy(kind, &request.resource_key, self.config.freshness(kind))
            .await?
        {
            tracing::debug!("Cache hit for {}", request);
            return Ok(CheckOutcome::Ready {
                payload: entry.payload,
            });
        }

        let acquired = self
            .store
            .try_acquire_lease(kind, &request.resource_key, self.config.lease_ttl)
            .await?;
        if !acquired {
            tracing::debug!("Job already in flight for {}", request);
            return Ok(CheckOutcome::Pending);
        }

        tracing::info!("Dispatching {} via {} trigger", request, self.trigger.name());
        let key = request.resource_key.clone();
        if let Err(e) = self.trigger.dispatch(request).await {
            tracing::error!(
                kind = %kind,
                key = %key,
                trigger = self.trigger.name(),
                "Dead letter: job dispatch failed: {}",
                e
            );
            let detail = format!("dispatch failed: {e}");
            if let Err(store_err) = self.store.mark_failed(kind, &key, &detail).await {
                tracing::error!("Could not record dispatch failure for {}: {}", key, store_err);
            }
            return Err(CoordinatorError::Dispatch(e));
        }

        Ok(CheckOutcome::Pending)
    }

    /// Read-only status of a key. Never starts work.
    pub async fn poll_status(
        &self,
        kind: ResourceKind,
        key: &str,
    ) -> Result<ResourceStatus, CoordinatorError> {
        let key = normalize_key(kind, key)
            .ok_or_else(|| CoordinatorError::InvalidRequest(format!("missing {kind} key")))?;

        if let Some(entry) = self
            .store
            .get_with_policy(kind, &key, self.config.freshness(kind))
            .await?
        {
            return Ok(ResourceStatus::Complete {
                payload: entry.payload,
            });
        }

        match self.store.job_state(kind, &key).await? {
            Some(JobState::Failed { detail, .. }) => Ok(ResourceStatus::Failed { error: detail }),
            Some(JobState::Running { .. }) | None => Ok(ResourceStatus::Pending),
        }
    }
}
