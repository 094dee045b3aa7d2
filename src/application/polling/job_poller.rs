//! JobPoller - fixed-interval polling of a job-status lookup.
//!
//! Not specific to generation jobs: anything that can answer "what is the
//! state of job X" through a [`StatusFetcher`] can be polled.
//!
//! ## Tick behavior
//!
//! | Fetch result | Effect |
//! |--------------|--------|
//! | pending status | reset not-found count, emit `Progress`, keep polling |
//! | completed status | emit `Completed`, stop |
//! | failed status | emit `Failed`, stop |
//! | not found | count it; at the threshold emit `Expired` and stop |
//! | other error | log, keep polling, count untouched |
//!
//! ## Guarantees
//!
//! - At most one live loop per job id: starting a second one cancels the first.
//! - Exactly one terminal event per loop, and nothing after it.
//! - Nothing is emitted after [`PollHandle::cancel`] returns.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use super::handle::{PollControl, PollHandle};
use crate::domain::foundation::JobId;
use crate::ports::BackendError;

/// How a fetched status should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDisposition {
    Pending,
    Completed,
    Failed(String),
}

/// A status value the poller can classify.
pub trait PolledStatus: Clone + Send + Sync + 'static {
    fn disposition(&self) -> PollDisposition;
}

/// Why a status fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The job is unknown to the source. Counts toward expiry.
    NotFound,
    /// Anything else. Logged and tolerated.
    Transient(String),
}

impl From<BackendError> for FetchError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound => FetchError::NotFound,
            other => FetchError::Transient(other.to_string()),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound => f.write_str("not found"),
            FetchError::Transient(msg) => f.write_str(msg),
        }
    }
}

/// Source of job status observations.
#[async_trait]
pub trait StatusFetcher: Send + Sync + 'static {
    type Status: PolledStatus;

    async fn fetch_status(&self, job_id: &JobId) -> Result<Self::Status, FetchError>;
}

/// Event emitted by a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent<S> {
    Progress(S),
    Completed(S),
    Failed(S, String),
    Expired(JobId),
}

impl<S> PollEvent<S> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollEvent::Progress(_))
    }
}

/// Shortest period a loop will tick at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Timing and expiry policy for a poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed period between fetches.
    pub interval: Duration,
    /// Consecutive not-found answers that expire the job.
    pub max_consecutive_not_found: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_consecutive_not_found: 3,
        }
    }
}

impl PollPolicy {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_max_consecutive_not_found(mut self, max: u32) -> Self {
        self.max_consecutive_not_found = max.max(1);
        self
    }

    /// The policy with both fields clamped to usable values.
    fn normalized(self) -> Self {
        Self {
            interval: self.interval.max(MIN_POLL_INTERVAL),
            max_consecutive_not_found: self.max_consecutive_not_found.max(1),
        }
    }
}

type Registry = Arc<Mutex<HashMap<JobId, PollHandle>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<JobId, PollHandle>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Starts and tracks poll loops.
///
/// Loops are spawned on the ambient tokio runtime.
#[derive(Debug)]
pub struct JobPoller {
    policy: PollPolicy,
    registry: Registry,
    next_generation: AtomicU64,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(PollPolicy::default())
    }
}

impl JobPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Starts polling `job_id` with the default policy.
    pub fn start<F>(
        &self,
        job_id: JobId,
        fetcher: Arc<F>,
    ) -> (PollHandle, mpsc::UnboundedReceiver<PollEvent<F::Status>>)
    where
        F: StatusFetcher,
    {
        self.start_with_policy(job_id, fetcher, self.policy.clone())
    }

    /// Starts polling `job_id`, cancelling any loop already polling it.
    pub fn start_with_policy<F>(
        &self,
        job_id: JobId,
        fetcher: Arc<F>,
        policy: PollPolicy,
    ) -> (PollHandle, mpsc::UnboundedReceiver<PollEvent<F::Status>>)
    where
        F: StatusFetcher,
    {
        let policy = policy.normalized();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let control = PollControl::new(job_id.clone(), generation);
        let handle = PollHandle::new(control.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        let previous = lock(&self.registry).insert(job_id.clone(), handle.clone());
        if let Some(previous) = previous {
            if previous.cancel() {
                tracing::info!(job_id = %job_id, "Replaced active poll loop");
            }
        }

        tracing::debug!(
            job_id = %job_id,
            interval_ms = policy.interval.as_millis() as u64,
            max_not_found = policy.max_consecutive_not_found,
            "Starting poll loop"
        );
        tokio::spawn(run_loop(control, fetcher, policy, tx, self.registry.clone()));

        (handle, rx)
    }

    /// Cancels the loop polling `job_id`, if any.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let handle = lock(&self.registry).remove(job_id);
        handle.map(|h| h.cancel()).unwrap_or(false)
    }

    /// Cancels every live loop.
    pub fn cancel_all(&self) {
        let handles: Vec<PollHandle> = lock(&self.registry).drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.cancel();
        }
    }

    pub fn is_polling(&self, job_id: &JobId) -> bool {
        lock(&self.registry)
            .get(job_id)
            .map(PollHandle::is_active)
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.registry).values().filter(|h| h.is_active()).count()
    }
}

async fn run_loop<F>(
    control: Arc<PollControl>,
    fetcher: Arc<F>,
    policy: PollPolicy,
    events: mpsc::UnboundedSender<PollEvent<F::Status>>,
    registry: Registry,
) where
    F: StatusFetcher,
{
    let job_id = control.job_id().clone();
    let mut shutdown = control.shutdown_signal();
    let mut interval = time::interval(policy.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_not_found: u32 = 0;

    let emit = |event: PollEvent<F::Status>| {
        let terminal = event.is_terminal();
        control.deliver_if_live(terminal, || events.send(event).is_ok())
    };

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }
        if control.is_stopped() {
            break;
        }

        let fetched = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            result = fetcher.fetch_status(&job_id) => result,
        };

        let keep_going = match fetched {
            Ok(status) => {
                consecutive_not_found = 0;
                match status.disposition() {
                    PollDisposition::Pending => {
                        tracing::debug!(job_id = %job_id, "Job still running");
                        emit(PollEvent::Progress(status))
                    }
                    PollDisposition::Completed => {
                        tracing::info!(job_id = %job_id, "Job completed");
                        emit(PollEvent::Completed(status));
                        false
                    }
                    PollDisposition::Failed(reason) => {
                        tracing::warn!(job_id = %job_id, reason = %reason, "Job failed");
                        emit(PollEvent::Failed(status, reason));
                        false
                    }
                }
            }
            Err(FetchError::NotFound) => {
                consecutive_not_found += 1;
                if consecutive_not_found >= policy.max_consecutive_not_found {
                    tracing::warn!(
                        job_id = %job_id,
                        not_found = consecutive_not_found,
                        "Job expired"
                    );
                    emit(PollEvent::Expired(job_id.clone()));
                    false
                } else {
                    tracing::debug!(
                        job_id = %job_id,
                        not_found = consecutive_not_found,
                        "Job not found, will retry"
                    );
                    true
                }
            }
            Err(FetchError::Transient(message)) => {
                tracing::warn!(job_id = %job_id, error = %message, "Status fetch failed, will retry");
                true
            }
        };

        if !keep_going {
            break;
        }
    }

    control.mark_exited();

    let mut registry = lock(&registry);
    let ours = registry
        .get(&job_id)
        .map(|h| h.control().generation() == control.generation())
        .unwrap_or(false);
    if ours {
        registry.remove(&job_id);
    }
}
