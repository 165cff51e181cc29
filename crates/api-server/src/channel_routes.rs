use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use insight_core::ResourceKind;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use youtube_client::YouTubeError;

use crate::{ApiResponse, AppError, AppState};

const DEFAULT_VIDEO_LIMIT: u32 = 2;
const MAX_VIDEO_LIMIT: u32 = 10;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ChannelVideosQuery {
    /// Display name of the channel, echoed on each video
    pub channel_name: Option<String>,
    /// Number of uploads to return (default 2, max 10)
    pub limit: Option<u32>,
}

/// A recent upload annotated with its cached summary, if any.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideoSummary {
    pub video_id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub published_at: DateTime<Utc>,
    pub channel_name: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUpdate {
    pub channel_name: String,
    pub channel_id: String,
    /// Latest upload was published within the last 24 hours
    pub has_new_video: bool,
    pub latest_video_id: Option<String>,
}

pub fn channel_routes() -> Router<AppState> {
    Router::new()
        .route("/api/channels/updates", get(channel_updates))
        .route("/api/channels/:channel_id/videos", get(channel_videos))
}

fn youtube_err(e: YouTubeError) -> AppError {
    match e {
        YouTubeError::MissingApiKey => AppError::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
            anyhow::anyhow!("YouTube API key is not configured"),
        ),
        other => AppError::with_status(
            StatusCode::BAD_GATEWAY,
            anyhow::anyhow!("YouTube request failed: {other}"),
        ),
    }
}

/// Latest uploads of a channel with their cached summaries
#[utoipa::path(
    get,
    path = "/api/channels/{channelId}/videos",
    params(
        ("channelId" = String, Path, description = "YouTube channel id (UC...)"),
        ChannelVideosQuery
    ),
    responses(
        (status = 200, description = "Recent uploads, newest first"),
        (status = 502, description = "YouTube request failed")
    ),
    tag = "Channels"
)]
pub async fn channel_videos(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<ChannelVideosQuery>,
) -> Result<Json<ApiResponse<Vec<ChannelVideoSummary>>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_VIDEO_LIMIT)
        .clamp(1, MAX_VIDEO_LIMIT);

    let videos = state
        .youtube
        .latest_uploads(&channel_id, limit)
        .await
        .map_err(youtube_err)?;

    let ids: Vec<String> = videos.iter().map(|v| v.video_id.clone()).collect();
    let mut summaries: HashMap<String, String> = state
        .store
        .get_many(ResourceKind::VideoSummary, &ids)
        .await?
        .into_iter()
        .map(|entry| (entry.key, entry.payload))
        .collect();

    let items = videos
        .into_iter()
        .map(|video| ChannelVideoSummary {
            summary: summaries.remove(&video.video_id),
            video_id: video.video_id,
            title: video.title,
            thumbnail: video.thumbnail,
            published_at: video.published_at,
            channel_name: query.channel_name.clone(),
        })
        .collect();

    Ok(Json(ApiResponse::success(items)))
}

/// Which configured channels uploaded in the last 24 hours
#[utoipa::path(
    get,
    path = "/api/channels/updates",
    responses((status = 200, description = "One entry per configured channel")),
    tag = "Channels"
)]
pub async fn channel_updates(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ChannelUpdate>>>, AppError> {
    let cutoff = Utc::now() - Duration::hours(24);

    let checks = state.channels.iter().map(|channel| {
        let youtube = state.youtube.clone();
        async move {
            let latest = match youtube.latest_uploads(&channel.channel_id, 1).await {
                Ok(videos) => videos.into_iter().next(),
                Err(e) => {
                    tracing::warn!("Update check failed for {}: {}", channel.name, e);
                    None
                }
            };
            ChannelUpdate {
                channel_name: channel.name.clone(),
                channel_id: channel.channel_id.clone(),
                has_new_video: latest
                    .as_ref()
                    .map(|v| v.published_at > cutoff)
                    .unwrap_or(false),
                latest_video_id: latest.map(|v| v.video_id),
            }
        }
    });

    Ok(Json(ApiResponse::success(join_all(checks).await)))
}
