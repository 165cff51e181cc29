use insight_core::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Gemini returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Prompt blocked: {0}")]
    Blocked(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No text in response")]
    EmptyResponse,

    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
}

pub type GeminiResult<T> = Result<T, GeminiError>;

impl From<GeminiError> for ProviderError {
    fn from(e: GeminiError) -> Self {
        match e {
            GeminiError::RequestFailed(e) => ProviderError::RequestFailed(e.to_string()),
            GeminiError::Status { status, body } => ProviderError::Status { status, body },
            GeminiError::Blocked(reason) => {
                ProviderError::InvalidResponse(format!("prompt blocked: {reason}"))
            }
            GeminiError::InvalidResponse(msg) => ProviderError::InvalidResponse(msg),
            GeminiError::EmptyResponse => ProviderError::EmptyResponse,
            GeminiError::MissingApiKey => ProviderError::NotConfigured("GEMINI_API_KEY".to_string()),
        }
    }
}
