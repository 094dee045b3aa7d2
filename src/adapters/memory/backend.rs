//! In-memory implementation of the backend ports.
//!
//! Behaves like the real backend closely enough to drive the workflow end to
//! end: created conversations carry two hidden setup turns, sent messages are
//! stored with server ids, and job status follows a per-job script.
//!
//! # Features
//!
//! - Scripted replies, job ids and job status sequences
//! - One-shot failure injection per endpoint
//! - Simulated send latency for concurrency tests
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let backend = InMemoryBackend::new();
//! backend.script_job_id(JobId::new("j1")?);
//! backend.script_statuses(JobId::new("j1")?, vec![
//!     Ok(JobStatusReport::new(JobState::Processing)),
//!     Ok(JobStatusReport::new(JobState::Completed)),
//! ]);
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::conversation::{GenerationSettings, Message, Role, SettingsPatch};
use crate::domain::foundation::{
    ArtifactId, ConversationId, JobId, MessageId, OwnerScope, Percentage, Timestamp,
};
use crate::domain::generation::{
    Artifact, ArtifactKind, ArtifactScope, JobProgress, JobState, JobStatusReport,
};
use crate::ports::{
    BackendError, ConversationApi, ConversationRecord, GenerationApi, MessageReply,
    SubmitJobRequest,
};

/// A message as received by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub conversation_id: ConversationId,
    pub text: String,
    pub finish: bool,
}

/// Replays a status script, then keeps answering with its last entry.
#[derive(Debug, Default)]
struct StatusScript {
    pending: VecDeque<Result<JobStatusReport, BackendError>>,
    last: Option<Result<JobStatusReport, BackendError>>,
    calls: usize,
}

impl StatusScript {
    fn next(&mut self) -> Result<JobStatusReport, BackendError> {
        self.calls += 1;
        if let Some(item) = self.pending.pop_front() {
            self.last = Some(item.clone());
            return item;
        }
        self.last.clone().unwrap_or(Err(BackendError::NotFound))
    }
}

#[derive(Debug, Default)]
struct State {
    conversations: HashMap<ConversationId, ConversationRecord>,
    replies: VecDeque<Result<MessageReply, BackendError>>,
    sent: Vec<SentMessage>,
    job_ids: VecDeque<JobId>,
    submitted: Vec<SubmitJobRequest>,
    statuses: HashMap<JobId, StatusScript>,
    artifacts: HashMap<ArtifactScope, Vec<Artifact>>,
    list_artifact_calls: usize,
    fail_create: Option<BackendError>,
    fail_submit: Option<BackendError>,
    fail_list_artifacts: Option<BackendError>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn server_message(&mut self, role: Role, content: &str) -> Result<Message, BackendError> {
        let id = MessageId::server(self.next_id("m"))
            .map_err(|e| BackendError::parse(e.to_string()))?;
        Ok(Message::confirmed(id, role, content, Timestamp::now()))
    }
}

/// Scriptable in-process backend.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    send_delay: Mutex<Duration>,
    simulate_jobs: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose submitted jobs progress to completion on their own and
    /// leave one artifact behind. Used for offline runs.
    pub fn simulated() -> Self {
        Self {
            simulate_jobs: true,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scripting
    // ─────────────────────────────────────────────────────────────────────────

    /// Stores a conversation as the backend would return it.
    pub fn insert_conversation(&self, id: ConversationId, record: ConversationRecord) {
        self.state().conversations.insert(id, record);
    }

    /// Queues the result of the next `send_message`.
    ///
    /// Without a scripted reply the backend echoes the text back.
    pub fn script_reply(&self, reply: Result<MessageReply, BackendError>) {
        self.state().replies.push_back(reply);
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self
            .send_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = delay;
    }

    /// Queues the id returned by the next `submit_job`.
    pub fn script_job_id(&self, job_id: JobId) {
        self.state().job_ids.push_back(job_id);
    }

    /// Sets the status answers for a job. Unknown jobs answer `NotFound`.
    pub fn script_statuses(
        &self,
        job_id: JobId,
        statuses: Vec<Result<JobStatusReport, BackendError>>,
    ) {
        let mut state = self.state();
        let script = state.statuses.entry(job_id).or_default();
        script.pending.extend(statuses);
    }

    pub fn add_artifact(&self, scope: ArtifactScope, artifact: Artifact) {
        self.state().artifacts.entry(scope).or_default().push(artifact);
    }

    pub fn clear_artifacts(&self, scope: &ArtifactScope) {
        self.state().artifacts.remove(scope);
    }

    pub fn fail_next_create(&self, err: BackendError) {
        self.state().fail_create = Some(err);
    }

    pub fn fail_next_submit(&self, err: BackendError) {
        self.state().fail_submit = Some(err);
    }

    pub fn fail_next_list_artifacts(&self, err: BackendError) {
        self.state().fail_list_artifacts = Some(err);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn conversation_count(&self) -> usize {
        self.state().conversations.len()
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<ConversationRecord> {
        self.state().conversations.get(id).cloned()
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    pub fn send_calls(&self) -> usize {
        self.state().sent.len()
    }

    pub fn submitted(&self) -> Vec<SubmitJobRequest> {
        self.state().submitted.clone()
    }

    pub fn status_calls(&self, job_id: &JobId) -> usize {
        self.state()
            .statuses
            .get(job_id)
            .map(|s| s.calls)
            .unwrap_or(0)
    }

    pub fn list_artifact_calls(&self) -> usize {
        self.state().list_artifact_calls
    }

    fn simulate(state: &mut State, request: &SubmitJobRequest, job_id: &JobId) {
        let progress = |pct: u8| -> Result<JobStatusReport, BackendError> {
            Ok(JobStatusReport::new(JobState::Processing).with_progress(JobProgress {
                percentage: Percentage::new(pct),
                current_step: "rendering".to_string(),
                completed_units: u32::from(pct / 25),
                total_units: 4,
            }))
        };
        let script = state.statuses.entry(job_id.clone()).or_default();
        script.pending.extend([
            Ok(JobStatusReport::new(JobState::Queued)),
            progress(50),
            progress(75),
            Ok(JobStatusReport::new(JobState::Completed)),
        ]);

        let artifact_id = state.next_id("artifact");
        if let Ok(id) = ArtifactId::new(artifact_id) {
            let url = format!("memory://artifacts/{}.mp4", id);
            let artifact = Artifact::new(
                id,
                Some(job_id.clone()),
                ArtifactKind::Video,
                url,
                Timestamp::now(),
            );
            state
                .artifacts
                .entry(ArtifactScope::Conversation(request.conversation_id.clone()))
                .or_default()
                .push(artifact);
        }
    }
}

#[async_trait]
impl ConversationApi for InMemoryBackend {
    async fn get_conversation(
        &self,
        _scope: &OwnerScope,
        conversation_id: &ConversationId,
    ) -> Result<ConversationRecord, BackendError> {
        self.state()
            .conversations
            .get(conversation_id)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        finish: bool,
    ) -> Result<MessageReply, BackendError> {
        self.state().sent.push(SentMessage {
            conversation_id: conversation_id.clone(),
            text: text.to_string(),
            finish,
        });

        let delay = *self
            .send_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let mut state = self.state();
        if !state.conversations.contains_key(conversation_id) {
            return Err(BackendError::NotFound);
        }
        let reply = match state.replies.pop_front() {
            Some(scripted) => scripted?,
            None if finish => MessageReply::text(format!(
                "Final brief for {}: {}",
                conversation_id, text
            )),
            None => MessageReply::text(format!("Reply to: {}", text)),
        };

        let user = state.server_message(Role::User, text)?;
        let mut assistant = state.server_message(Role::Assistant, &reply.response_text)?;
        if let Some(url) = &reply.image_url {
            assistant = assistant.with_image_url(url.clone());
        }
        if let Some(record) = state.conversations.get_mut(conversation_id) {
            record.messages.push(user);
            record.messages.push(assistant);
            if reply.image_url.is_some() {
                record.current_image_url = reply.image_url.clone();
            }
        }
        Ok(reply)
    }

    async fn create_conversation(
        &self,
        _scope: &OwnerScope,
        reference_image_url: &str,
        settings: &GenerationSettings,
    ) -> Result<ConversationId, BackendError> {
        let mut state = self.state();
        if let Some(err) = state.fail_create.take() {
            return Err(err);
        }

        let id = ConversationId::new(state.next_id("conv"))
            .map_err(|e| BackendError::parse(e.to_string()))?;
        let setup = vec![
            state.server_message(Role::User, "You are an ad creative assistant.")?,
            state.server_message(Role::Assistant, "Understood.")?,
        ];
        let record = ConversationRecord {
            messages: setup,
            current_image_url: None,
            reference_image_url: Some(reference_image_url.to_string())
                .filter(|url| !url.trim().is_empty()),
            settings: Some(SettingsPatch::from(settings)),
        };
        state.conversations.insert(id.clone(), record);
        Ok(id)
    }

    async fn delete_conversation(
        &self,
        _scope: &OwnerScope,
        conversation_id: &ConversationId,
    ) -> Result<(), BackendError> {
        self.state()
            .conversations
            .remove(conversation_id)
            .map(|_| ())
            .ok_or(BackendError::NotFound)
    }
}

#[async_trait]
impl GenerationApi for InMemoryBackend {
    async fn submit_job(&self, request: &SubmitJobRequest) -> Result<JobId, BackendError> {
        let mut state = self.state();
        if let Some(err) = state.fail_submit.take() {
            return Err(err);
        }

        let job_id = match state.job_ids.pop_front() {
            Some(id) => id,
            None => JobId::new(state.next_id("job"))
                .map_err(|e| BackendError::parse(e.to_string()))?,
        };
        state.submitted.push(request.clone());
        if self.simulate_jobs && !state.statuses.contains_key(&job_id) {
            Self::simulate(&mut state, request, &job_id);
        }
        Ok(job_id)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, BackendError> {
        self.state()
            .statuses
            .entry(job_id.clone())
            .or_default()
            .next()
    }

    async fn list_artifacts(&self, scope: &ArtifactScope) -> Result<Vec<Artifact>, BackendError> {
        let mut state = self.state();
        state.list_artifact_calls += 1;
        if let Some(err) = state.fail_list_artifacts.take() {
            return Err(err);
        }
        Ok(state.artifacts.get(scope).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::TenantId;

    fn scope() -> OwnerScope {
        OwnerScope::without_subject(TenantId::new("t1").unwrap())
    }

    #[tokio::test]
    async fn created_conversation_has_hidden_setup_turns() {
        let backend = InMemoryBackend::new();
        let id = backend
            .create_conversation(&scope(), "https://x/img.png", &GenerationSettings::default())
            .await
            .unwrap();

        let record = backend.get_conversation(&scope(), &id).await.unwrap();
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.reference_image_url.as_deref(), Some("https://x/img.png"));
    }

    #[tokio::test]
    async fn sent_messages_are_stored_with_server_ids() {
        let backend = InMemoryBackend::new();
        let id = backend
            .create_conversation(&scope(), "", &GenerationSettings::default())
            .await
            .unwrap();

        let reply = backend.send_message(&id, "hello", false).await.unwrap();

        assert_eq!(reply.response_text, "Reply to: hello");
        let record = backend.conversation(&id).unwrap();
        assert_eq!(record.messages.len(), 4);
        assert!(record.messages.iter().all(|m| !m.is_optimistic()));
    }

    #[tokio::test]
    async fn status_script_repeats_last_answer() {
        let backend = InMemoryBackend::new();
        let job = JobId::new("j1").unwrap();
        backend.script_statuses(job.clone(), vec![Ok(JobStatusReport::new(JobState::Processing))]);

        for _ in 0..3 {
            let report = backend.job_status(&job).await.unwrap();
            assert_eq!(report.state, JobState::Processing);
        }
        assert_eq!(backend.status_calls(&job), 3);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend.job_status(&JobId::new("nope").unwrap()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let backend = InMemoryBackend::new();
        backend.fail_next_list_artifacts(BackendError::transient("503"));
        let scope = ArtifactScope::Conversation(ConversationId::new("c1").unwrap());

        assert!(backend.list_artifacts(&scope).await.is_err());
        assert!(backend.list_artifacts(&scope).await.unwrap().is_empty());
        assert_eq!(backend.list_artifact_calls(), 2);
    }

    #[tokio::test]
    async fn simulated_jobs_complete_and_leave_an_artifact() {
        let backend = InMemoryBackend::simulated();
        let conversation_id = ConversationId::new("c1").unwrap();
        let request = SubmitJobRequest {
            conversation_id: conversation_id.clone(),
            scope: scope(),
            brief: "brief".into(),
            reference_image_url: String::new(),
            settings: GenerationSettings::default(),
        };

        let job = backend.submit_job(&request).await.unwrap();
        let mut last = JobState::Queued;
        for _ in 0..4 {
            last = backend.job_status(&job).await.unwrap().state;
        }

        assert_eq!(last, JobState::Completed);
        let artifacts = backend
            .list_artifacts(&ArtifactScope::Conversation(conversation_id))
            .await
            .unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].source_job_id, Some(job));
    }
}
