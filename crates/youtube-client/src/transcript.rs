use std::time::Duration;

use async_trait::async_trait;
use insight_core::{ProviderError, TranscriptProvider};
use reqwest::Client;
use serde::Deserialize;

const BASE_URL: &str = "https://api.supadata.ai";

#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl TranscriptConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("SUPADATA_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            base_url: std::env::var("SUPADATA_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| BASE_URL.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    content: Option<serde_json::Value>,
}

/// Transcript provider backed by the SupaData YouTube transcript API.
#[derive(Clone)]
pub struct SupaDataClient {
    client: Client,
    config: TranscriptConfig,
}

impl SupaDataClient {
    pub fn new(config: TranscriptConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    pub fn from_env() -> Self {
        Self::new(TranscriptConfig::from_env())
    }
}

#[async_trait]
impl TranscriptProvider for SupaDataClient {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>, ProviderError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            tracing::error!("SupaData API key is not configured");
            return Ok(None);
        };

        let video_url = format!("https://www.youtube.com/watch?v={video_id}");
        let response = self
            .client
            .get(format!(
                "{}/v1/youtube/transcript",
                self.config.base_url.trim_end_matches('/')
            ))
            .query(&[("url", video_url.as_str()), ("text", "true")])
            .header("x-api-key", api_key)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            tracing::warn!(
                "SupaData returned {} for video {}",
                response.status(),
                video_id
            );
            return Ok(None);
        }

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        // With text=true the content is a plain string.
        let text = match body.content {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => {
                tracing::warn!("Unexpected transcript shape for {}, expected text", video_id);
                other.to_string()
            }
        };

        if text.trim().is_empty() {
            tracing::info!("No transcript available for video {}", video_id);
            return Ok(None);
        }
        Ok(Some(text))
    }
}
