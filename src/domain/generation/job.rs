//! Generation job and its state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::conversation::Provider;
use crate::domain::foundation::{ConversationId, JobId, Percentage, StateMachine, Timestamp};

/// State of an asynchronous generation job.
///
/// ```text
/// queued -> processing -> { completed | failed | cancelled }
///    \________________________^
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_success(&self) -> bool {
        matches!(self, JobState::Completed)
    }
}

impl StateMachine for JobState {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use JobState::*;
        match self {
            Queued => vec![Processing, Completed, Failed, Cancelled],
            Processing => vec![Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => vec![],
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Progress reported by the backend while a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobProgress {
    pub percentage: Percentage,
    pub current_step: String,
    pub completed_units: u32,
    pub total_units: u32,
}

/// A status observation for a job, as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusReport {
    pub state: JobState,
    pub progress: Option<JobProgress>,
    /// Backend-provided failure reason for failed/cancelled jobs.
    pub error: Option<String>,
}

impl JobStatusReport {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            progress: None,
            error: None,
        }
    }

    pub fn with_progress(mut self, progress: JobProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Outcome of applying a status report to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// State advanced (or stayed) and the report was applied.
    Applied,
    /// The report asked for an impossible transition and was ignored.
    Ignored { from: JobState, to: JobState },
}

/// A generation job submitted for one conversation.
///
/// Mutated only by the poller bound to it; discarded once terminal and
/// reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    id: JobId,
    conversation_id: ConversationId,
    provider: Provider,
    state: JobState,
    progress: Option<JobProgress>,
    failure_reason: Option<String>,
    submitted_at: Timestamp,
    updated_at: Timestamp,
}

impl GenerationJob {
    /// A job handle fresh from submission.
    pub fn submitted(id: JobId, conversation_id: ConversationId, provider: Provider) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            conversation_id,
            provider,
            state: JobState::Queued,
            progress: None,
            failure_reason: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn progress(&self) -> Option<&JobProgress> {
        self.progress.as_ref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn submitted_at(&self) -> &Timestamp {
        &self.submitted_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Applies a status report.
    ///
    /// Repeated reports of the current state refresh progress. Transitions the
    /// state machine forbids (e.g. `processing -> queued`) leave the job
    /// untouched.
    pub fn apply_status(&mut self, report: JobStatusReport) -> StatusChange {
        if report.state != self.state && !self.state.can_transition_to(&report.state) {
            return StatusChange::Ignored {
                from: self.state,
                to: report.state,
            };
        }

        self.state = report.state;
        if report.progress.is_some() {
            self.progress = report.progress;
        }
        if matches!(self.state, JobState::Failed | JobState::Cancelled) {
            self.failure_reason = Some(
                report
                    .error
                    .unwrap_or_else(|| format!("generation {}", self.state)),
            );
        }
        self.updated_at = Timestamp::now();
        StatusChange::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> GenerationJob {
        GenerationJob::submitted(
            JobId::new("j1").unwrap(),
            ConversationId::new("c1").unwrap(),
            Provider::ProviderB,
        )
    }

    fn progress(pct: u8) -> JobProgress {
        JobProgress {
            percentage: Percentage::new(pct),
            current_step: "render".into(),
            completed_units: 1,
            total_units: 3,
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Processing.is_terminal());
    }

    #[test]
    fn processing_reports_update_progress() {
        let mut job = job();
        assert_eq!(
            job.apply_status(JobStatusReport::new(JobState::Processing).with_progress(progress(40))),
            StatusChange::Applied
        );
        job.apply_status(JobStatusReport::new(JobState::Processing).with_progress(progress(80)));
        assert_eq!(job.progress().map(|p| p.percentage.value()), Some(80));
        assert_eq!(job.state(), JobState::Processing);
    }

    #[test]
    fn backward_transition_is_ignored() {
        let mut job = job();
        job.apply_status(JobStatusReport::new(JobState::Processing));
        let change = job.apply_status(JobStatusReport::new(JobState::Queued));
        assert_eq!(
            change,
            StatusChange::Ignored {
                from: JobState::Processing,
                to: JobState::Queued
            }
        );
        assert_eq!(job.state(), JobState::Processing);
    }

    #[test]
    fn failure_reason_defaults_when_backend_gives_none() {
        let mut job = job();
        job.apply_status(JobStatusReport::new(JobState::Cancelled));
        assert_eq!(job.failure_reason(), Some("generation cancelled"));

        let mut job = self::job();
        job.apply_status(JobStatusReport::new(JobState::Failed).with_error("content policy"));
        assert_eq!(job.failure_reason(), Some("content policy"));
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobState::Processing).unwrap(),
            "\"processing\""
        );
    }
}
