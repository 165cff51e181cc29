use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use insight_core::{CheckOutcome, JobRequest, ResourceKind, ResourceStatus};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{resource_status, start_resource, AppError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalysisRequest {
    /// YouTube video id
    pub video_id: Option<String>,
    /// Channel the video belongs to; selects the summary template
    pub channel_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct VideoStatusQuery {
    pub video_id: Option<String>,
}

pub fn analysis_routes() -> axum::Router<AppState> {
    Router::new()
        .route("/api/video-analysis", post(start_video_analysis))
        .route("/api/video-analysis/status", get(video_analysis_status))
}

/// Return a video summary or start generating it
#[utoipa::path(
    post,
    path = "/api/video-analysis",
    request_body = VideoAnalysisRequest,
    responses(
        (status = 200, description = "Summary already cached", body = CheckOutcome),
        (status = 202, description = "Summary job started or already running", body = CheckOutcome),
        (status = 400, description = "Missing videoId"),
        (status = 500, description = "Storage or dispatch failure")
    ),
    tag = "Video analysis"
)]
pub async fn start_video_analysis(
    State(state): State<AppState>,
    Json(req): Json<VideoAnalysisRequest>,
) -> Result<(StatusCode, Json<CheckOutcome>), AppError> {
    let video_id = req
        .video_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("videoId is required"))?;
    let channel = req.channel_name.filter(|c| !c.trim().is_empty());

    start_resource(&state, JobRequest::video_summary(video_id, channel)).await
}

/// Poll the summary status of a video
#[utoipa::path(
    get,
    path = "/api/video-analysis/status",
    params(VideoStatusQuery),
    responses(
        (status = 200, description = "pending, complete or failed", body = ResourceStatus),
        (status = 400, description = "Missing videoId")
    ),
    tag = "Video analysis"
)]
pub async fn video_analysis_status(
    State(state): State<AppState>,
    Query(query): Query<VideoStatusQuery>,
) -> Result<Json<ResourceStatus>, AppError> {
    resource_status(&state, ResourceKind::VideoSummary, query.video_id.as_deref()).await
}
