//! Generation API Port - job submission, job status and artifact listing.

use async_trait::async_trait;

use super::BackendError;
use crate::domain::conversation::{GenerationSettings, Provider};
use crate::domain::foundation::{ConversationId, JobId, OwnerScope};
use crate::domain::generation::{Artifact, ArtifactScope, JobStatusReport};

/// Port for the backend's generation endpoints.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Submits a generation job and returns its id without waiting for it.
    async fn submit_job(&self, request: &SubmitJobRequest) -> Result<JobId, BackendError>;

    /// Looks up a job's current state.
    ///
    /// Returns `BackendError::NotFound` if the backend does not (or no longer)
    /// know the job.
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, BackendError>;

    /// Lists every artifact associated with a scope. Read-only.
    async fn list_artifacts(&self, scope: &ArtifactScope) -> Result<Vec<Artifact>, BackendError>;
}

/// Everything the backend needs to run one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitJobRequest {
    pub conversation_id: ConversationId,
    pub scope: OwnerScope,
    /// The full final reply text. Never truncated client-side.
    pub brief: String,
    pub reference_image_url: String,
    pub settings: GenerationSettings,
}

impl SubmitJobRequest {
    pub fn provider(&self) -> Provider {
        self.settings.provider
    }
}
