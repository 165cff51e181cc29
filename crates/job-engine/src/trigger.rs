use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use insight_core::{JobRequest, JobTrigger, TriggerError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::JobRunner;

/// Hands jobs to an in-process [`WorkerPool`] through a bounded channel.
///
/// Dispatch never waits: a full queue is reported as `QueueFull` instead.
#[derive(Clone)]
pub struct QueueTrigger {
    tx: mpsc::Sender<JobRequest>,
}

#[async_trait]
impl JobTrigger for QueueTrigger {
    async fn dispatch(&self, request: JobRequest) -> Result<(), TriggerError> {
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => TriggerError::QueueFull,
            TrySendError::Closed(_) => TriggerError::Closed,
        })
    }

    fn name(&self) -> &'static str {
        "queue"
    }
}

/// Fixed set of tokio tasks draining the job queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` consumers over a queue holding at most `capacity` pending jobs.
    pub fn spawn(runner: Arc<JobRunner>, workers: usize, capacity: usize) -> (QueueTrigger, Self) {
        let (tx, rx) = mpsc::channel::<JobRequest>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|id| {
                let runner = runner.clone();
                let rx = rx.clone();
                tokio::spawn(async move {
                    tracing::debug!("Job worker {} started", id);
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(request) = next else { break };

                        let label = request.to_string();
                        // Failures, panics included, are logged and recorded by the runner.
                        if let Ok(outcome) = runner.clone().run_detached(request).await {
                            tracing::debug!("Worker {} finished {}: {:?}", id, label, outcome);
                        }
                    }
                    tracing::debug!("Job worker {} stopped", id);
                })
            })
            .collect();

        (QueueTrigger { tx }, Self { workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for the workers to drain the queue. Returns once every
    /// `QueueTrigger` clone has been dropped and the backlog is done.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Job worker exited abnormally: {}", e);
            }
        }
    }

    /// Drain the queue for at most `grace`, then abort whatever is left.
    ///
    /// Every `QueueTrigger` clone must be dropped first, otherwise the workers
    /// keep waiting for jobs until `grace` runs out. Returns `true` if the
    /// backlog finished in time.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let handles: Vec<_> = self.workers.iter().map(|w| w.abort_handle()).collect();
        match tokio::time::timeout(grace, self.join()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    "Job queue not drained after {:?}, aborting {} workers",
                    grace,
                    handles.len()
                );
                for handle in handles {
                    handle.abort();
                }
                false
            }
        }
    }
}

/// Dispatches jobs by POSTing them to a job-run endpoint, typically another
/// instance of the API server. Retries transport errors and 5xx responses.
#[derive(Clone)]
pub struct HttpTrigger {
    client: reqwest::Client,
    endpoint: String,
    max_attempts: u32,
    backoff: Duration,
}

impl HttpTrigger {
    /// `base_url` is the public address of a server exposing `/api/jobs/run`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint: format!("{}/api/jobs/run", base_url.trim_end_matches('/')),
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl JobTrigger for HttpTrigger {
    async fn dispatch(&self, request: JobRequest) -> Result<(), TriggerError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) if response.status().is_client_error() => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(TriggerError::Transport(format!(
                        "job endpoint rejected {request}: {status} {body}"
                    )));
                }
                Ok(response) => last_error = format!("job endpoint returned {}", response.status()),
                Err(e) => last_error = e.to_string(),
            }

            if attempt < self.max_attempts {
                tracing::warn!(
                    "Dispatch of {} failed ({}), retry {}/{}",
                    request,
                    last_error,
                    attempt,
                    self.max_attempts - 1
                );
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }

        Err(TriggerError::Transport(format!(
            "{last_error} after {} attempts",
            self.max_attempts
        )))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeModel, FakeTranscripts, PanickingModel, RecordingTrigger};
    use crate::RequestCoordinator;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use insight_core::{CacheStore, CheckOutcome, JobState, ResourceKind, ResourceStatus};
    use insight_store::MemoryCacheStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_worker_pool_runs_queued_jobs() {
        let store = Arc::new(MemoryCacheStore::new());
        let runner = Arc::new(JobRunner::new(
            store.clone(),
            Arc::new(FakeTranscripts::with_text("transcript")),
            Arc::new(FakeModel::replying("generated")),
        ));
        let (trigger, pool) = WorkerPool::spawn(runner, 2, 8);
        assert_eq!(pool.len(), 2);

        for symbol in ["AAPL", "MSFT", "GOOG"] {
            trigger
                .dispatch(JobRequest::trading_insight(symbol))
                .await
                .unwrap();
        }
        trigger
            .dispatch(JobRequest::video_summary("vid1", None))
            .await
            .unwrap();
        drop(trigger);
        pool.join().await;

        for symbol in ["AAPL", "MSFT", "GOOG"] {
            let entry = store
                .get_any(ResourceKind::TradingInsight, symbol)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(entry.payload, "generated");
        }
        assert!(store
            .get_any(ResourceKind::VideoSummary, "vid1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_failing_job_does_not_stop_workers() {
        let store = Arc::new(MemoryCacheStore::new());
        let runner = Arc::new(JobRunner::new(
            store.clone(),
            Arc::new(FakeTranscripts::default()),
            Arc::new(FakeModel::replying("insight")),
        ));
        let (trigger, pool) = WorkerPool::spawn(runner, 1, 4);

        trigger
            .dispatch(JobRequest::video_summary("no-transcript", None))
            .await
            .unwrap();
        trigger
            .dispatch(JobRequest::trading_insight("AMD"))
            .await
            .unwrap();
        drop(trigger);
        pool.join().await;

        assert!(matches!(
            store
                .job_state(ResourceKind::VideoSummary, "no-transcript")
                .await
                .unwrap(),
            Some(JobState::Failed { .. })
        ));
        assert!(store
            .get_any(ResourceKind::TradingInsight, "AMD")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported_failed() {
        let store = Arc::new(MemoryCacheStore::new());
        let runner = Arc::new(JobRunner::new(
            store.clone(),
            Arc::new(FakeTranscripts::default()),
            Arc::new(PanickingModel),
        ));
        let (trigger, pool) = WorkerPool::spawn(runner, 1, 4);
        let coordinator = RequestCoordinator::new(store.clone(), Arc::new(trigger.clone()));

        let outcome = coordinator
            .check_or_start(JobRequest::trading_insight("AAPL"))
            .await
            .unwrap();
        assert_eq!(outcome, CheckOutcome::Pending);
        // The worker survives the panic and still runs the next job.
        trigger
            .dispatch(JobRequest::video_summary("no-transcript", None))
            .await
            .unwrap();
        drop(coordinator);
        drop(trigger);
        pool.join().await;

        let status = coordinator_status(&store, "AAPL").await;
        assert!(matches!(status, ResourceStatus::Failed { error } if error.contains("panicked")));
        assert!(matches!(
            store
                .job_state(ResourceKind::VideoSummary, "no-transcript")
                .await
                .unwrap(),
            Some(JobState::Failed { .. })
        ));
    }

    async fn coordinator_status(store: &Arc<MemoryCacheStore>, symbol: &str) -> ResourceStatus {
        let coordinator =
            RequestCoordinator::new(store.clone(), Arc::new(RecordingTrigger::default()));
        coordinator
            .poll_status(ResourceKind::TradingInsight, symbol)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_shutdown_drains_backlog() {
        let store = Arc::new(MemoryCacheStore::new());
        let runner = Arc::new(JobRunner::new(
            store.clone(),
            Arc::new(FakeTranscripts::default()),
            Arc::new(FakeModel::replying("generated")),
        ));
        let (trigger, pool) = WorkerPool::spawn(runner, 1, 8);
        for symbol in ["AAPL", "MSFT"] {
            trigger
                .dispatch(JobRequest::trading_insight(symbol))
                .await
                .unwrap();
        }
        drop(trigger);

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        for symbol in ["AAPL", "MSFT"] {
            assert!(store
                .get_any(ResourceKind::TradingInsight, symbol)
                .await
                .unwrap()
                .is_some());
            assert_eq!(
                store
                    .job_state(ResourceKind::TradingInsight, symbol)
                    .await
                    .unwrap(),
                None
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_gives_up_while_triggers_remain() {
        let runner = Arc::new(JobRunner::new(
            Arc::new(MemoryCacheStore::new()),
            Arc::new(FakeTranscripts::default()),
            Arc::new(FakeModel::replying("generated")),
        ));
        let (_trigger, pool) = WorkerPool::spawn(runner, 2, 8);

        assert!(!pool.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_queue_full_and_closed() {
        let (tx, rx) = mpsc::channel::<JobRequest>(1);
        let trigger = QueueTrigger { tx };

        trigger
            .dispatch(JobRequest::trading_insight("AAPL"))
            .await
            .unwrap();
        let err = trigger
            .dispatch(JobRequest::trading_insight("MSFT"))
            .await
            .unwrap_err();
        assert!(matches!(err, TriggerError::QueueFull));

        drop(rx);
        let err = trigger
            .dispatch(JobRequest::trading_insight("MSFT"))
            .await
            .unwrap_err();
        assert!(matches!(err, TriggerError::Closed));
    }

    #[derive(Clone)]
    struct JobEndpoint {
        calls: Arc<AtomicUsize>,
        fail_first: usize,
        status_on_fail: StatusCode,
    }

    async fn run_handler(
        State(endpoint): State<JobEndpoint>,
        Json(request): Json<JobRequest>,
    ) -> StatusCode {
        let n = endpoint.calls.fetch_add(1, Ordering::SeqCst);
        if n < endpoint.fail_first {
            return endpoint.status_on_fail;
        }
        assert_eq!(request.resource_key, "AAPL");
        StatusCode::ACCEPTED
    }

    async fn spawn_endpoint(
        fail_first: usize,
        status_on_fail: StatusCode,
    ) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = JobEndpoint {
            calls: calls.clone(),
            fail_first,
            status_on_fail,
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/api/jobs/run", post(run_handler))
            .with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), calls)
    }

    #[tokio::test]
    async fn test_http_trigger_retries_server_errors() {
        let (base_url, calls) = spawn_endpoint(2, StatusCode::SERVICE_UNAVAILABLE).await;
        let trigger = HttpTrigger::new(&base_url).with_retry(3, Duration::from_millis(5));

        trigger
            .dispatch(JobRequest::trading_insight("AAPL"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_http_trigger_gives_up() {
        let (base_url, calls) = spawn_endpoint(10, StatusCode::INTERNAL_SERVER_ERROR).await;
        let trigger = HttpTrigger::new(&base_url).with_retry(3, Duration::from_millis(5));

        let err = trigger
            .dispatch(JobRequest::trading_insight("AAPL"))
            .await
            .unwrap_err();
        assert!(matches!(err, TriggerError::Transport(msg) if msg.contains("after 3 attempts")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_http_trigger_does_not_retry_rejections() {
        let (base_url, calls) = spawn_endpoint(10, StatusCode::BAD_REQUEST).await;
        let trigger = HttpTrigger::new(&base_url).with_retry(3, Duration::from_millis(5));

        assert!(trigger
            .dispatch(JobRequest::trading_insight("AAPL"))
            .await
            .is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_trigger_unreachable() {
        let trigger =
            HttpTrigger::new("http://127.0.0.1:9").with_retry(2, Duration::from_millis(1));
        assert_eq!(trigger.endpoint(), "http://127.0.0.1:9/api/jobs/run");
        let err = trigger
            .dispatch(JobRequest::video_summary("vid", None))
            .await
            .unwrap_err();
        assert!(matches!(err, TriggerError::Transport(_)));
    }
}
