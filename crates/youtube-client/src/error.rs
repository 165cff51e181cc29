use insight_core::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum YouTubeError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("YouTube API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("YOUTUBE_API_KEY is not set")]
    MissingApiKey,
}

impl From<YouTubeError> for ProviderError {
    fn from(e: YouTubeError) -> Self {
        match e {
            YouTubeError::RequestFailed(e) => ProviderError::RequestFailed(e.to_string()),
            YouTubeError::Status { status, body } => ProviderError::Status { status, body },
            YouTubeError::MissingApiKey => {
                ProviderError::NotConfigured("YOUTUBE_API_KEY".to_string())
            }
        }
    }
}
