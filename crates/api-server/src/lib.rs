//! HTTP boundary of the job cache: resource endpoints, status polling, the
//! background job entry point and channel listings.

pub mod config;

mod analysis_routes;
mod channel_routes;
mod insight_routes;
mod job_routes;
mod openapi;
mod request_id;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use insight_core::{
    CacheStore, CheckOutcome, JobRequest, JobTrigger, ResourceKind, ResourceStatus,
};
use insight_store::{CacheDb, SqlCacheStore};
use job_engine::{
    CoordinatorError, HttpTrigger, JobRunner, PromptCatalog, RequestCoordinator, WorkerPool,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use youtube_client::{SupaDataClient, YouTubeClient};

use config::{ChannelConfig, ServerConfig, TriggerMode};

pub use openapi::ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: RequestCoordinator,
    pub runner: Arc<JobRunner>,
    pub store: Arc<dyn CacheStore>,
    pub youtube: YouTubeClient,
    pub channels: Arc<Vec<ChannelConfig>>,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error type for handlers: a status code plus the error to report.
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.error);
        } else {
            tracing::debug!("Request rejected: {}", self.error);
        }
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.error.to_string()),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map coordinator errors onto HTTP statuses.
fn coordinator_err(e: CoordinatorError) -> AppError {
    match e {
        CoordinatorError::InvalidRequest(_) => {
            AppError::with_status(StatusCode::BAD_REQUEST, e.into())
        }
        CoordinatorError::StorageUnavailable(_) | CoordinatorError::Dispatch(_) => {
            AppError::with_status(StatusCode::INTERNAL_SERVER_ERROR, e.into())
        }
    }
}

/// Shared body of the two "give me X or start it" endpoints.
async fn start_resource(
    state: &AppState,
    request: JobRequest,
) -> Result<(StatusCode, Json<CheckOutcome>), AppError> {
    let outcome = state
        .coordinator
        .check_or_start(request)
        .await
        .map_err(coordinator_err)?;
    let status = match outcome {
        CheckOutcome::Ready { .. } => StatusCode::OK,
        CheckOutcome::Pending => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome)))
}

/// Shared body of the two status endpoints.
async fn resource_status(
    state: &AppState,
    kind: ResourceKind,
    key: Option<&str>,
) -> Result<Json<ResourceStatus>, AppError> {
    let key = key.unwrap_or_default();
    let status = state
        .coordinator
        .poll_status(kind, key)
        .await
        .map_err(coordinator_err)?;
    Ok(Json(status))
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Server is up", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    Json(ApiDoc::openapi())
}

/// Full application router with middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/openapi.json", get(openapi_json))
        .merge(analysis_routes::analysis_routes())
        .merge(insight_routes::insight_routes())
        .merge(job_routes::job_routes())
        .merge(channel_routes::channel_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// How long shutdown waits for queued jobs before aborting them.
const JOB_DRAIN_GRACE: std::time::Duration = std::time::Duration::from_secs(30);

pub async fn run_server() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;

    let db = CacheDb::connect(&config.database_url, config.db_max_connections).await?;
    let store: Arc<dyn CacheStore> = Arc::new(SqlCacheStore::new(db));

    let gemini = gemini_client::GeminiClient::from_env();
    if !gemini.is_configured() {
        tracing::warn!("GEMINI_API_KEY not set, generation jobs will fail");
    }
    let engine = config.engine_config();
    let lease_ttl = engine.lease_ttl.to_std().unwrap_or_default();
    if gemini.config().max_duration() >= lease_ttl {
        tracing::warn!(
            "Gemini calls may outlive the {:?} job lease, duplicate jobs are possible",
            lease_ttl
        );
    }
    let runner = Arc::new(
        JobRunner::new(
            store.clone(),
            Arc::new(SupaDataClient::from_env()),
            Arc::new(gemini),
        )
        .with_prompts(PromptCatalog::new(&config.day_trading_channels))
        .with_config(engine.clone()),
    );

    let (trigger, pool): (Arc<dyn JobTrigger>, Option<WorkerPool>) = match &config.trigger {
        TriggerMode::Queue { workers, capacity } => {
            let (trigger, pool) = WorkerPool::spawn(runner.clone(), *workers, *capacity);
            tracing::info!("Job queue started with {} workers", pool.len());
            (Arc::new(trigger), Some(pool))
        }
        TriggerMode::Http { public_base_url } => {
            let trigger = HttpTrigger::new(public_base_url);
            tracing::info!("Jobs dispatched over HTTP to {}", trigger.endpoint());
            (Arc::new(trigger), None)
        }
    };

    let state = AppState {
        coordinator: RequestCoordinator::new(store.clone(), trigger).with_config(engine),
        runner,
        store,
        youtube: YouTubeClient::from_env(),
        channels: Arc::new(config.youtube_channels.clone()),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("API server listening on {}", config.bind_addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router, and with it the last queue trigger, is gone; let queued jobs finish.
    if let Some(pool) = pool {
        if pool.shutdown(JOB_DRAIN_GRACE).await {
            tracing::info!("Job queue drained");
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use insight_core::{GenerationRequest, GenerativeModel, ProviderError, TranscriptProvider};
    use insight_store::MemoryCacheStore;
    use std::sync::Mutex;
    use youtube_client::YouTubeConfig;

    pub struct StaticTranscripts;

    #[async_trait]
    impl TranscriptProvider for StaticTranscripts {
        async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>, ProviderError> {
            Ok((video_id != "no-captions").then(|| format!("transcript of {video_id}")))
        }
    }

    /// Model that answers every prompt with the same text and keeps the prompts.
    pub struct EchoModel {
        pub reply: String,
        pub prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerativeModel for EchoModel {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    pub struct TestApp {
        pub router: Router,
        pub store: Arc<MemoryCacheStore>,
        pub model: Arc<EchoModel>,
        pub runner: Arc<JobRunner>,
        pub trigger: Arc<RecordingTrigger>,
    }

    /// Trigger that records dispatched jobs so tests can run them by hand.
    #[derive(Default)]
    pub struct RecordingTrigger {
        pub jobs: Mutex<Vec<JobRequest>>,
    }

    #[async_trait]
    impl JobTrigger for RecordingTrigger {
        async fn dispatch(&self, request: JobRequest) -> Result<(), insight_core::TriggerError> {
            self.jobs.lock().unwrap().push(request);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    pub fn test_app_with(youtube: YouTubeConfig, channels: Vec<ChannelConfig>) -> TestApp {
        let store = Arc::new(MemoryCacheStore::new());
        let model = Arc::new(EchoModel {
            reply: "Insight text".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let runner = Arc::new(JobRunner::new(
            store.clone(),
            Arc::new(StaticTranscripts),
            model.clone(),
        ));
        let trigger = Arc::new(RecordingTrigger::default());
        let state = AppState {
            coordinator: RequestCoordinator::new(store.clone(), trigger.clone()),
            runner: runner.clone(),
            store: store.clone(),
            youtube: YouTubeClient::new(youtube),
            channels: Arc::new(channels),
        };
        TestApp {
            router: build_router(state),
            store,
            model,
            runner,
            trigger,
        }
    }

    pub fn test_app() -> TestApp {
        test_app_with(YouTubeConfig::default(), Vec::new())
    }

    pub fn json_request(
        method: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
