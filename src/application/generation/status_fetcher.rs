//! Binds a `GenerationJob` to the poller.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::application::polling::{FetchError, PollDisposition, PolledStatus, StatusFetcher};
use crate::domain::foundation::JobId;
use crate::domain::generation::{GenerationJob, JobState, StatusChange};
use crate::ports::GenerationApi;

impl PolledStatus for GenerationJob {
    fn disposition(&self) -> PollDisposition {
        match self.state() {
            JobState::Completed => PollDisposition::Completed,
            JobState::Failed | JobState::Cancelled => PollDisposition::Failed(
                self.failure_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("generation {}", self.state())),
            ),
            JobState::Queued | JobState::Processing => PollDisposition::Pending,
        }
    }
}

/// Fetches status for one job and folds each report into its `GenerationJob`.
///
/// The poll loop is the only caller, so the job has a single writer.
pub struct GenerationStatusFetcher {
    api: Arc<dyn GenerationApi>,
    job: Mutex<GenerationJob>,
}

impl GenerationStatusFetcher {
    pub fn new(api: Arc<dyn GenerationApi>, job: GenerationJob) -> Self {
        Self {
            api,
            job: Mutex::new(job),
        }
    }

    /// Snapshot of the job as last observed.
    pub fn job(&self) -> GenerationJob {
        self.job
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl StatusFetcher for GenerationStatusFetcher {
    type Status = GenerationJob;

    async fn fetch_status(&self, job_id: &JobId) -> Result<GenerationJob, FetchError> {
        let report = self.api.job_status(job_id).await?;

        let mut job = self.job.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let StatusChange::Ignored { from, to } = job.apply_status(report) {
            tracing::warn!(
                job_id = %job_id,
                from = %from,
                to = %to,
                "Ignoring backward job status"
            );
        }
        Ok(job.clone())
    }
}
