use async_trait::async_trait;
use insight_core::{GenerationRequest, GenerativeModel, ProviderError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{GeminiError, GeminiResult};
use crate::GeminiConfig;

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> GeminiResult<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GeminiError::Blocked(reason));
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GeminiError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    pub fn from_env() -> Self {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Generate text for a single-turn prompt.
    pub async fn generate_content(&self, prompt: &str, grounding: bool) -> GeminiResult<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GeminiError::MissingApiKey)?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            tools: if grounding {
                vec![Tool {
                    google_search: serde_json::json!({}),
                }]
            } else {
                Vec::new()
            },
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let mut attempt = 0u32;
        loop {
            let sent = self
                .client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&body)
                .send()
                .await;
            let response = match sent {
                Ok(response) => response,
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Gemini request failed: {}, retrying in {:?} ({}/{})",
                        e,
                        self.config.retry_backoff,
                        attempt,
                        self.config.max_retries
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status.is_success() {
                let parsed = response
                    .json::<GenerateContentResponse>()
                    .await
                    .map_err(|e| GeminiError::InvalidResponse(e.to_string()))?;
                return parsed.into_text();
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.config.max_retries {
                attempt += 1;
                tracing::warn!(
                    "Gemini returned {}, retrying in {:?} ({}/{})",
                    status,
                    self.config.retry_backoff,
                    attempt,
                    self.config.max_retries
                );
                tokio::time::sleep(self.config.retry_backoff).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let text = self
            .generate_content(&request.prompt, request.grounding)
            .await?;
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
