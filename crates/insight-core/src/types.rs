use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading insights are regenerated once they are older than this.
pub const TRADING_INSIGHT_TTL_HOURS: i64 = 48;

/// The kinds of generated resources. Each kind owns its own keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    VideoSummary,
    TradingInsight,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::VideoSummary, ResourceKind::TradingInsight];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::VideoSummary => "video_summary",
            ResourceKind::TradingInsight => "trading_insight",
        }
    }

    /// Default reuse policy for cached payloads of this kind.
    ///
    /// A published video does not change, so its summary is kept forever.
    /// Market conditions do, so insights expire.
    pub fn default_freshness(&self) -> FreshnessPolicy {
        match self {
            ResourceKind::VideoSummary => FreshnessPolicy::Forever,
            ResourceKind::TradingInsight => {
                FreshnessPolicy::MaxAge(Duration::hours(TRADING_INSIGHT_TTL_HOURS))
            }
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video_summary" => Ok(ResourceKind::VideoSummary),
            "trading_insight" => Ok(ResourceKind::TradingInsight),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// How long a cached payload may be reused before it must be regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessPolicy {
    Forever,
    MaxAge(Duration),
}

impl FreshnessPolicy {
    /// An entry is fresh while `now - generated_at <= max_age`.
    pub fn is_fresh(&self, generated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            FreshnessPolicy::Forever => true,
            FreshnessPolicy::MaxAge(max_age) => now - generated_at <= *max_age,
        }
    }
}

/// A generated payload (summary or insight) and the time it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    pub generated_at: DateTime<Utc>,
}

/// Raw transcript text for a video, written once and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub video_id: String,
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

/// Kind-specific auxiliary input to a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct JobContext {
    /// Channel the video was published on; selects the summary prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
}

/// A unit of expensive generation work. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub resource_key: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub context: JobContext,
}

impl JobRequest {
    pub fn video_summary(video_id: impl Into<String>, channel_name: Option<String>) -> Self {
        Self {
            resource_key: video_id.into(),
            kind: ResourceKind::VideoSummary,
            context: JobContext { channel_name },
        }
    }

    pub fn trading_insight(symbol: impl Into<String>) -> Self {
        Self {
            resource_key: symbol.into(),
            kind: ResourceKind::TradingInsight,
            context: JobContext::default(),
        }
    }
}

impl fmt::Display for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.resource_key)
    }
}

/// Book-keeping for a job that has been dispatched for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// A job holds the lease for this key.
    Running { started_at: DateTime<Utc> },
    /// The last job for this key failed and nothing has replaced it yet.
    Failed {
        detail: String,
        failed_at: DateTime<Utc>,
    },
}

/// Answer to a "give me the result or start producing it" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    Ready { payload: String },
    Pending,
}

/// Answer to a status poll. Reads only, never starts work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    Complete { payload: String },
    Failed { error: String },
}
