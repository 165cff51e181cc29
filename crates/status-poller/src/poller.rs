use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use insight_core::{CheckOutcome, JobRequest, ResourceKind, ResourceStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{PollError, StatusSource};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between status polls.
    pub interval: Duration,
    /// Polls issued before giving up with `TimedOut`.
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 60,
        }
    }
}

/// Where a poll session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requesting,
    Pending { attempts: u32 },
    Complete { payload: String },
    Failed { error: String },
    TimedOut { attempts: u32 },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Complete { .. } | PollState::Failed { .. } | PollState::TimedOut { .. }
        )
    }
}

/// Terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Complete { payload: String },
    /// The source reported a failed job, or could not be reached.
    Failed { error: String },
    TimedOut { attempts: u32 },
}

impl From<PollOutcome> for PollState {
    fn from(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::Complete { payload } => PollState::Complete { payload },
            PollOutcome::Failed { error } => PollState::Failed { error },
            PollOutcome::TimedOut { attempts } => PollState::TimedOut { attempts },
        }
    }
}

type InFlightKey = (ResourceKind, String);

/// Removes a key from the in-flight set when its session ends, however it ends.
struct InFlightGuard {
    in_flight: Arc<DashSet<InFlightKey>>,
    key: InFlightKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// Runs at most one poll session per resource key.
#[derive(Clone)]
pub struct Poller {
    source: Arc<dyn StatusSource>,
    config: PollerConfig,
    in_flight: Arc<DashSet<InFlightKey>>,
}

impl Poller {
    pub fn new(source: Arc<dyn StatusSource>, config: PollerConfig) -> Self {
        Self {
            source,
            config,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn is_polling(&self, kind: ResourceKind, key: &str) -> bool {
        job_engine::normalize_key(kind, key)
            .map(|key| self.in_flight.contains(&(kind, key)))
            .unwrap_or(false)
    }

    /// Start a background session for `request`.
    ///
    /// Fails with `AlreadyPolling` if a session for the same key is still running.
    pub fn start(&self, request: JobRequest) -> Result<PollSession, PollError> {
        let (guard, request) = self.claim(request)?;
        let (state_tx, state_rx) = watch::channel(PollState::Idle);
        let source = self.source.clone();
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            drive(source.as_ref(), &config, &request, &state_tx).await
        });

        Ok(PollSession {
            state: state_rx,
            task,
        })
    }

    /// Run a session to completion on the current task.
    pub async fn poll(&self, request: JobRequest) -> Result<PollOutcome, PollError> {
        let (_guard, request) = self.claim(request)?;
        let (state_tx, _) = watch::channel(PollState::Idle);
        Ok(drive(self.source.as_ref(), &self.config, &request, &state_tx).await)
    }

    /// Reserve the canonical key of `request`, so `aapl` and `AAPL` share one session.
    fn claim(&self, mut request: JobRequest) -> Result<(InFlightGuard, JobRequest), PollError> {
        request.resource_key = job_engine::normalize_key(request.kind, &request.resource_key)
            .ok_or_else(|| PollError::InvalidRequest(format!("missing {} key", request.kind)))?;

        let key = (request.kind, request.resource_key.clone());
        if !self.in_flight.insert(key.clone()) {
            return Err(PollError::AlreadyPolling(request.to_string()));
        }
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            key,
        };
        Ok((guard, request))
    }
}

/// Handle to a running session.
pub struct PollSession {
    state: watch::Receiver<PollState>,
    task: JoinHandle<PollOutcome>,
}

impl PollSession {
    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    pub async fn outcome(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => PollOutcome::Failed {
                error: format!("poll task aborted: {e}"),
            },
        }
    }

    /// Stop polling. The job itself keeps running server-side.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

async fn drive(
    source: &dyn StatusSource,
    config: &PollerConfig,
    request: &JobRequest,
    state: &watch::Sender<PollState>,
) -> PollOutcome {
    let outcome = run_session(source, config, request, state).await;
    match &outcome {
        PollOutcome::Complete { .. } => tracing::debug!("Poll for {} complete", request),
        PollOutcome::Failed { error } => tracing::warn!("Poll for {} failed: {}", request, error),
        PollOutcome::TimedOut { attempts } => {
            tracing::warn!("Poll for {} timed out after {} attempts", request, attempts)
        }
    }
    state.send_replace(outcome.clone().into());
    outcome
}

async fn run_session(
    source: &dyn StatusSource,
    config: &PollerConfig,
    request: &JobRequest,
    state: &watch::Sender<PollState>,
) -> PollOutcome {
    state.send_replace(PollState::Requesting);
    match source.check_or_start(request).await {
        Ok(CheckOutcome::Ready { payload }) => return PollOutcome::Complete { payload },
        Ok(CheckOutcome::Pending) => {}
        Err(e) => {
            return PollOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
    state.send_replace(PollState::Pending { attempts: 0 });

    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.interval).await;

        match source.poll_status(request.kind, &request.resource_key).await {
            Ok(ResourceStatus::Complete { payload }) => return PollOutcome::Complete { payload },
            Ok(ResourceStatus::Failed { error }) => return PollOutcome::Failed { error },
            Ok(ResourceStatus::Pending) => {
                state.send_replace(PollState::Pending { attempts: attempt });
            }
            Err(e) => {
                return PollOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    PollOutcome::TimedOut {
        attempts: config.max_attempts,
    }
}
