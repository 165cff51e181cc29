use thiserror::Error;

/// Failures of the cache store collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of upstream providers (transcripts, generative model, video listings).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider returned no content")]
    EmptyResponse,
}

/// Failures to hand a job over to the runner.
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is closed")]
    Closed,

    #[error("Trigger transport error: {0}")]
    Transport(String),
}
