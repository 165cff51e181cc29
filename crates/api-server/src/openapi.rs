use insight_core::{CheckOutcome, JobContext, JobRequest, ResourceKind, ResourceStatus};
use utoipa::OpenApi;

use crate::analysis_routes::VideoAnalysisRequest;
use crate::channel_routes::{ChannelUpdate, ChannelVideoSummary};
use crate::insight_routes::TradingInsightRequest;
use crate::job_routes::JobAccepted;
use crate::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MarketBrief API",
        description = "Cached video summaries and trading insights. Missing results are generated in the background; poll the status endpoints until they complete."
    ),
    paths(
        crate::health,
        crate::analysis_routes::start_video_analysis,
        crate::analysis_routes::video_analysis_status,
        crate::insight_routes::start_trading_insight,
        crate::insight_routes::trading_insight_status,
        crate::job_routes::run_job,
        crate::channel_routes::channel_videos,
        crate::channel_routes::channel_updates,
    ),
    components(schemas(
        CheckOutcome,
        ResourceStatus,
        ResourceKind,
        JobRequest,
        JobContext,
        VideoAnalysisRequest,
        TradingInsightRequest,
        JobAccepted,
        ChannelVideoSummary,
        ChannelUpdate,
        HealthResponse,
    )),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Video analysis", description = "Video summaries generated from transcripts"),
        (name = "Trading insights", description = "Per-symbol insights, regenerated after 48 hours"),
        (name = "Jobs", description = "Background job entry point"),
        (name = "Channels", description = "YouTube channel uploads and update checks")
    )
)]
pub struct ApiDoc;
