//! Deduplicated async job cache: the coordinator that answers requests, the runner
//! that does the expensive generation, and the triggers that connect them.

mod coordinator;
mod error;
mod prompts;
mod runner;
mod trigger;

pub use coordinator::RequestCoordinator;
pub use error::{CoordinatorError, JobError};
pub use prompts::PromptCatalog;
pub use runner::{JobOutcome, JobRunner};
pub use trigger::{HttpTrigger, QueueTrigger, WorkerPool};

use chrono::Duration;
use insight_core::{FreshnessPolicy, ResourceKind, TRADING_INSIGHT_TTL_HOURS};

/// Tunables shared by the coordinator and the runner.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a trading insight is reused before regeneration.
    pub insight_ttl: Duration,
    /// How long a running job blocks new dispatches for the same key.
    /// Must exceed the slowest expected generation.
    pub lease_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            insight_ttl: Duration::hours(TRADING_INSIGHT_TTL_HOURS),
            lease_ttl: Duration::minutes(15),
        }
    }
}

impl EngineConfig {
    pub fn freshness(&self, kind: ResourceKind) -> FreshnessPolicy {
        match kind {
            // Summaries have no TTL, only insights expire.
            ResourceKind::VideoSummary => FreshnessPolicy::Forever,
            ResourceKind::TradingInsight => FreshnessPolicy::MaxAge(self.insight_ttl),
        }
    }
}

/// Canonical form of a resource key, or `None` if there is nothing left.
pub fn normalize_key(kind: ResourceKind, key: &str) -> Option<String> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some(match kind {
        ResourceKind::TradingInsight => key.to_uppercase(),
        ResourceKind::VideoSummary => key.to_string(),
    })
}
