pub mod client;
pub mod error;

pub use client::GeminiClient;
pub use error::{GeminiError, GeminiResult};

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Configuration for the Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Generation with grounding routinely takes minutes.
    pub timeout: Duration,
    /// Extra attempts after a transport error, a 429 or a 5xx.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(240),
            max_retries: 2,
            retry_backoff: Duration::from_secs(10),
        }
    }
}

impl GeminiConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.model),
            base_url: std::env::var("GEMINI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.base_url),
            timeout: std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            ..defaults
        }
    }

    /// Longest a single `generate_content` call can take, retries included.
    pub fn max_duration(&self) -> Duration {
        self.timeout * (self.max_retries + 1) + self.retry_backoff * self.max_retries
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }
}
