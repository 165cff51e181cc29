use insight_core::{ProviderError, StoreError, TriggerError};
use thiserror::Error;

/// Why a job produced no cache entry.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Transcript could not be retrieved for video {0}")]
    TranscriptUnavailable(String),

    #[error("Transcript provider failed: {0}")]
    Transcript(#[source] ProviderError),

    #[error("Generation failed: {0}")]
    Generation(#[source] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Job task did not finish: {0}")]
    Aborted(String),
}

/// Errors reported synchronously to whoever asked the coordinator.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    StorageUnavailable(#[from] StoreError),

    #[error("Could not dispatch job: {0}")]
    Dispatch(#[from] TriggerError),
}
