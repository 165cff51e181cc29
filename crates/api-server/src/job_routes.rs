use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use insight_core::JobRequest;
use serde::Serialize;
use utoipa::ToSchema;

use crate::request_id::RequestId;
use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct JobAccepted {
    /// `kind:key` of the accepted job
    pub job: String,
}

pub fn job_routes() -> Router<AppState> {
    Router::new().route("/api/jobs/run", post(run_job))
}

/// Run a generation job in the background
///
/// Entry point for jobs dispatched over HTTP. Responds as soon as the job is
/// spawned; the result lands in the cache and the job status.
#[utoipa::path(
    post,
    path = "/api/jobs/run",
    request_body = JobRequest,
    responses(
        (status = 202, description = "Job accepted", body = JobAccepted),
        (status = 400, description = "Missing resource key")
    ),
    tag = "Jobs"
)]
pub async fn run_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(mut job): Json<JobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JobAccepted>>), AppError> {
    job.resource_key = job_engine::normalize_key(job.kind, &job.resource_key)
        .ok_or_else(|| AppError::bad_request("resourceKey is required"))?;

    let label = job.to_string();
    tracing::info!(request_id = %request_id.0, "Accepted background job {}", label);

    let runner = state.runner.clone();
    tokio::spawn(async move {
        // Failures, panics included, are logged and recorded by the runner.
        let _ = runner.run_detached(job).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(JobAccepted { job: label })),
    ))
}
