use std::time::Duration;

use async_trait::async_trait;
use insight_core::{CheckOutcome, JobRequest, ResourceKind, ResourceStatus};
use job_engine::{CoordinatorError, RequestCoordinator};
use reqwest::Client;
use serde::Deserialize;

use crate::PollError;

/// The two server operations a poller needs.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn check_or_start(&self, request: &JobRequest) -> Result<CheckOutcome, PollError>;

    async fn poll_status(&self, kind: ResourceKind, key: &str)
        -> Result<ResourceStatus, PollError>;
}

fn coordinator_error(e: CoordinatorError) -> PollError {
    match e {
        CoordinatorError::InvalidRequest(msg) => PollError::InvalidRequest(msg),
        other => PollError::Transport(other.to_string()),
    }
}

/// Poll an in-process coordinator directly.
#[async_trait]
impl StatusSource for RequestCoordinator {
    async fn check_or_start(&self, request: &JobRequest) -> Result<CheckOutcome, PollError> {
        RequestCoordinator::check_or_start(self, request.clone())
            .await
            .map_err(coordinator_error)
    }

    async fn poll_status(
        &self,
        kind: ResourceKind,
        key: &str,
    ) -> Result<ResourceStatus, PollError> {
        RequestCoordinator::poll_status(self, kind, key)
            .await
            .map_err(coordinator_error)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Talks to the API server's resource and status endpoints.
#[derive(Clone)]
pub struct HttpStatusSource {
    client: Client,
    base_url: String,
}

impl HttpStatusSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resource_path(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::VideoSummary => "/api/video-analysis",
            ResourceKind::TradingInsight => "/api/trading-insights",
        }
    }

    fn key_param(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::VideoSummary => "videoId",
            ResourceKind::TradingInsight => "symbol",
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PollError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| PollError::Transport(e.to_string()));
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| status.to_string());
        if status.is_client_error() {
            Err(PollError::InvalidRequest(message))
        } else {
            Err(PollError::Transport(format!("{status}: {message}")))
        }
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn check_or_start(&self, request: &JobRequest) -> Result<CheckOutcome, PollError> {
        let body = match request.kind {
            ResourceKind::VideoSummary => serde_json::json!({
                "videoId": request.resource_key,
                "channelName": request.context.channel_name,
            }),
            ResourceKind::TradingInsight => serde_json::json!({ "symbol": request.resource_key }),
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, Self::resource_path(request.kind)))
            .json(&body)
            .send()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn poll_status(
        &self,
        kind: ResourceKind,
        key: &str,
    ) -> Result<ResourceStatus, PollError> {
        let response = self
            .client
            .get(format!("{}{}/status", self.base_url, Self::resource_path(kind)))
            .query(&[(Self::key_param(kind), key)])
            .send()
            .await
            .map_err(|e| PollError::Transport(e.to_string()))?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn start_insight(
        Json(body): Json<serde_json::Value>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        match body["symbol"].as_str() {
            Some("AAPL") => (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "ready", "payload": "cached" })),
            ),
            Some("") | None => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "success": false, "error": "symbol is required" })),
            ),
            Some(_) => (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "status": "pending" })),
            ),
        }
    }

    async fn video_status(
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        match params.get("videoId").map(String::as_str) {
            Some("done") => (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "complete", "payload": "summary" })),
            ),
            Some("broken") => (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "failed", "error": "no transcript" })),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "success": false, "error": "storage unavailable" })),
            ),
        }
    }

    async fn spawn_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/api/trading-insights", post(start_insight))
            .route("/api/video-analysis/status", get(video_status));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_check_or_start_over_http() {
        let source = HttpStatusSource::new(spawn_server().await);

        let ready = source
            .check_or_start(&JobRequest::trading_insight("AAPL"))
            .await
            .unwrap();
        assert_eq!(
            ready,
            CheckOutcome::Ready {
                payload: "cached".to_string()
            }
        );

        let pending = source
            .check_or_start(&JobRequest::trading_insight("TSLA"))
            .await
            .unwrap();
        assert_eq!(pending, CheckOutcome::Pending);

        let err = source
            .check_or_start(&JobRequest::trading_insight(""))
            .await
            .unwrap_err();
        assert_eq!(err, PollError::InvalidRequest("symbol is required".to_string()));
    }

    #[tokio::test]
    async fn test_poll_status_over_http() {
        let source = HttpStatusSource::new(spawn_server().await);

        assert_eq!(
            source
                .poll_status(ResourceKind::VideoSummary, "done")
                .await
                .unwrap(),
            ResourceStatus::Complete {
                payload: "summary".to_string()
            }
        );
        assert_eq!(
            source
                .poll_status(ResourceKind::VideoSummary, "broken")
                .await
                .unwrap(),
            ResourceStatus::Failed {
                error: "no transcript".to_string()
            }
        );
        let err = source
            .poll_status(ResourceKind::VideoSummary, "other")
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Transport(msg) if msg.contains("storage unavailable")));
    }
}
