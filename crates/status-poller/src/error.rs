use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// This session is already polling the key.
    #[error("Already polling {0}")]
    AlreadyPolling(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The status source could not be reached or answered with an error.
    #[error("Transport error: {0}")]
    Transport(String),
}
