//! GenerationOrchestrator - turns a finalized conversation into a tracked job.
//!
//! `submit` returns as soon as the backend has accepted the job. `watch` binds
//! a poll loop to it and reports progress and exactly one outcome. For a
//! completed job the artifacts are pulled before the outcome is reported.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::errors::GenerationError;
use super::reconciler::ArtifactReconciler;
use super::status_fetcher::GenerationStatusFetcher;
use crate::application::conversation::{ConversationController, ConversationHandle};
use crate::application::polling::{JobPoller, PollEvent, PollHandle};
use crate::domain::conversation::{Conversation, FinalReply};
use crate::domain::foundation::{ConversationId, ErrorCode, JobId};
use crate::domain::generation::{Artifact, ArtifactScope, GenerationJob};
use crate::ports::{GenerationApi, SubmitJobRequest};

/// How a watched job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The job completed. `artifacts` is the reconciled set for the
    /// conversation; if the pull failed it is the previously known set and
    /// `reconcile_error` says why.
    Completed {
        job: GenerationJob,
        artifacts: Vec<Artifact>,
        reconcile_error: Option<GenerationError>,
    },
    /// The job failed or was cancelled by the backend.
    Failed { job: GenerationJob, reason: String },
    /// The backend stopped knowing the job.
    Expired { job: GenerationJob },
}

impl JobOutcome {
    pub fn job(&self) -> &GenerationJob {
        match self {
            JobOutcome::Completed { job, .. }
            | JobOutcome::Failed { job, .. }
            | JobOutcome::Expired { job } => job,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }

    /// Error code for an outcome that did not end cleanly.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            JobOutcome::Completed {
                reconcile_error, ..
            } => reconcile_error.as_ref().map(GenerationError::code),
            JobOutcome::Failed { .. } => Some(ErrorCode::BackendRejected),
            JobOutcome::Expired { .. } => Some(ErrorCode::Expired),
        }
    }
}

/// Handle to one watched job.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    watch_id: u64,
    conversation_id: ConversationId,
    poll: PollHandle,
    task: AbortHandle,
    done: watch::Receiver<bool>,
    cancelled: Arc<Mutex<bool>>,
}

impl WatchHandle {
    pub fn job_id(&self) -> &JobId {
        self.poll.job_id()
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Stops polling and drops any pending outcome. Idempotent.
    ///
    /// If the terminal callback is already running, waits for it to return;
    /// it must not cancel its own watch.
    pub fn cancel(&self) {
        *self
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = true;
        self.poll.cancel();
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !*self.done.borrow()
    }

    /// Waits until the outcome has been delivered or the watch was cancelled.
    pub async fn finished(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }
}

type WatchRegistry = Arc<Mutex<HashMap<ConversationId, Vec<WatchHandle>>>>;

fn lock(registry: &WatchRegistry) -> MutexGuard<'_, HashMap<ConversationId, Vec<WatchHandle>>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a watch finished and unregisters it, however its task ends.
struct WatchGuard {
    watch_id: u64,
    conversation_id: ConversationId,
    registry: WatchRegistry,
    done: watch::Sender<bool>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.done.send_replace(true);
        let mut registry = lock(&self.registry);
        if let Some(handles) = registry.get_mut(&self.conversation_id) {
            handles.retain(|h| h.watch_id != self.watch_id);
            if handles.is_empty() {
                registry.remove(&self.conversation_id);
            }
        }
    }
}

/// Coordinates submission, polling and artifact reconciliation.
pub struct GenerationOrchestrator {
    api: Arc<dyn GenerationApi>,
    poller: JobPoller,
    reconciler: Arc<ArtifactReconciler>,
    watches: WatchRegistry,
    next_watch_id: AtomicU64,
}

impl GenerationOrchestrator {
    pub fn new(
        api: Arc<dyn GenerationApi>,
        poller: JobPoller,
        reconciler: Arc<ArtifactReconciler>,
    ) -> Self {
        Self {
            api,
            poller,
            reconciler,
            watches: Arc::new(Mutex::new(HashMap::new())),
            next_watch_id: AtomicU64::new(1),
        }
    }

    pub fn reconciler(&self) -> &Arc<ArtifactReconciler> {
        &self.reconciler
    }

    /// Submits a generation job for `conversation` with the full brief.
    ///
    /// Never retried here; the caller decides whether to resubmit.
    ///
    /// # Errors
    ///
    /// - `EmptyBrief` if the reply text is blank
    /// - `PromptTooLong` if the backend rejected the brief for length
    /// - `Rejected`, `Unauthorized`, `TransientIo` for other backend failures
    pub async fn submit(
        &self,
        conversation: &Conversation,
        reply: &FinalReply,
    ) -> Result<GenerationJob, GenerationError> {
        if reply.text.trim().is_empty() {
            return Err(GenerationError::EmptyBrief);
        }

        let request = SubmitJobRequest {
            conversation_id: conversation.id().clone(),
            scope: conversation.scope().clone(),
            brief: reply.text.clone(),
            reference_image_url: conversation
                .current_image_url()
                .unwrap_or_default()
                .to_string(),
            settings: conversation.settings().clone(),
        };

        let job_id = self.api.submit_job(&request).await.map_err(|e| {
            let err = GenerationError::from_submit(e);
            tracing::warn!(
                conversation_id = %request.conversation_id,
                error = %err,
                "Generation submit failed"
            );
            err
        })?;

        tracing::info!(
            conversation_id = %request.conversation_id,
            job_id = %job_id,
            provider = %request.provider(),
            brief_len = request.brief.len(),
            "Generation job submitted"
        );
        let provider = request.provider();
        Ok(GenerationJob::submitted(
            job_id,
            request.conversation_id,
            provider,
        ))
    }

    /// Finalizes the conversation, then submits its brief.
    pub async fn finalize_and_submit(
        &self,
        controller: &ConversationController,
        handle: &ConversationHandle,
    ) -> Result<GenerationJob, GenerationError> {
        let reply = controller.finalize(handle).await?;
        let conversation = handle.snapshot();
        self.submit(&conversation, &reply).await
    }

    /// Closes the conversation view and cancels every watch bound to it.
    /// Returns how many watches were live.
    pub fn close_conversation(
        &self,
        controller: &ConversationController,
        handle: &ConversationHandle,
    ) -> usize {
        controller.close(handle);
        self.cancel_conversation(handle.id())
    }

    /// Polls `job` until it ends.
    ///
    /// `on_progress` runs for every non-terminal observation. `on_terminal`
    /// runs once with the outcome, unless the watch is cancelled first.
    pub fn watch<P, T>(&self, job: GenerationJob, mut on_progress: P, on_terminal: T) -> WatchHandle
    where
        P: FnMut(&GenerationJob) + Send + 'static,
        T: FnOnce(JobOutcome) + Send + 'static,
    {
        let watch_id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        let conversation_id = job.conversation_id().clone();
        let fetcher = Arc::new(GenerationStatusFetcher::new(self.api.clone(), job.clone()));
        let (poll, mut events) = self.poller.start(job.id().clone(), fetcher.clone());
        let (done_tx, done_rx) = watch::channel(false);

        let guard = WatchGuard {
            watch_id,
            conversation_id: conversation_id.clone(),
            registry: self.watches.clone(),
            done: done_tx,
        };
        let reconciler = self.reconciler.clone();
        let cancelled = Arc::new(Mutex::new(false));
        let delivery = cancelled.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            while let Some(event) = events.recv().await {
                let outcome = match event {
                    PollEvent::Progress(job) => {
                        on_progress(&job);
                        continue;
                    }
                    PollEvent::Completed(job) => completed(&reconciler, job).await,
                    PollEvent::Failed(job, reason) => JobOutcome::Failed { job, reason },
                    PollEvent::Expired(_) => JobOutcome::Expired { job: fetcher.job() },
                };
                deliver_unless_cancelled(&delivery, on_terminal, outcome);
                break;
            }
        });

        let handle = WatchHandle {
            watch_id,
            conversation_id: conversation_id.clone(),
            poll,
            task: task.abort_handle(),
            done: done_rx,
            cancelled,
        };

        // The guard marks done before taking this lock, so a watch seen as
        // not done here is still unregistered by its guard later.
        let mut registry = lock(&self.watches);
        if handle.is_active() {
            registry
                .entry(conversation_id)
                .or_default()
                .push(handle.clone());
        }
        handle
    }

    /// Cancels every watch bound to a conversation. Returns how many were live.
    pub fn cancel_conversation(&self, conversation_id: &ConversationId) -> usize {
        let handles = lock(&self.watches)
            .remove(conversation_id)
            .unwrap_or_default();
        let live = handles.iter().filter(|h| h.is_active()).count();
        for handle in &handles {
            handle.cancel();
        }
        if live > 0 {
            tracing::info!(
                conversation_id = %conversation_id,
                cancelled = live,
                "Cancelled generation watches"
            );
        }
        live
    }

    pub fn active_watches(&self, conversation_id: &ConversationId) -> usize {
        lock(&self.watches)
            .get(conversation_id)
            .map(|handles| handles.iter().filter(|h| h.is_active()).count())
            .unwrap_or(0)
    }

    /// Cancels every watch and poll loop.
    pub fn shutdown(&self) {
        let all: Vec<WatchHandle> = lock(&self.watches)
            .drain()
            .flat_map(|(_, handles)| handles)
            .collect();
        for handle in &all {
            handle.cancel();
        }
        self.poller.cancel_all();
    }
}

/// Runs `on_terminal` under the cancel lock so `WatchHandle::cancel` cannot
/// return while a delivery is in progress.
fn deliver_unless_cancelled<T>(cancelled: &Mutex<bool>, on_terminal: T, outcome: JobOutcome)
where
    T: FnOnce(JobOutcome),
{
    let cancelled = cancelled.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if !*cancelled {
        on_terminal(outcome);
    }
}

async fn completed(reconciler: &ArtifactReconciler, job: GenerationJob) -> JobOutcome {
    let scope = ArtifactScope::Conversation(job.conversation_id().clone());
    match reconciler.pull(&scope).await {
        Ok(artifacts) => JobOutcome::Completed {
            job,
            artifacts,
            reconcile_error: None,
        },
        Err(e) => {
            tracing::warn!(
                job_id = %job.id(),
                error = %e,
                "Artifact pull failed after completion"
            );
            JobOutcome::Completed {
                artifacts: reconciler.known(&scope),
                job,
                reconcile_error: Some(GenerationError::Reconcile(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBackend;
    use crate::application::polling::PollPolicy;
    use crate::domain::conversation::GenerationSettings;
    use crate::domain::foundation::{ArtifactId, OwnerScope, Percentage, TenantId, Timestamp};
    use crate::domain::generation::{ArtifactKind, JobProgress, JobState, JobStatusReport};
    use crate::ports::BackendError;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn orchestrator(backend: Arc<InMemoryBackend>) -> GenerationOrchestrator {
        let poller = JobPoller::new(PollPolicy::default().with_interval(Duration::from_millis(5)));
        let reconciler = Arc::new(ArtifactReconciler::new(backend.clone()));
        GenerationOrchestrator::new(backend, poller, reconciler)
    }

    fn conversation(id: &str) -> Conversation {
        Conversation::created(
            ConversationId::new(id).unwrap(),
            OwnerScope::without_subject(TenantId::new("t1").unwrap()),
            GenerationSettings::default(),
            "https://x/img.png",
        )
    }

    fn reply(conversation: &Conversation, text: &str) -> FinalReply {
        FinalReply {
            conversation_id: conversation.id().clone(),
            text: text.to_string(),
            received_at: Timestamp::now(),
        }
    }

    fn processing(pct: u8) -> Result<JobStatusReport, BackendError> {
        Ok(JobStatusReport::new(JobState::Processing).with_progress(JobProgress {
            percentage: Percentage::new(pct),
            ..JobProgress::default()
        }))
    }

    #[tokio::test]
    async fn submit_sends_full_brief_settings_and_reference() {
        let backend = Arc::new(InMemoryBackend::new());
        let orch = orchestrator(backend.clone());
        let conv = conversation("c1");
        let brief = "x".repeat(10_000);

        let job = orch.submit(&conv, &reply(&conv, &brief)).await.unwrap();

        assert_eq!(job.state(), JobState::Queued);
        let submitted = backend.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].brief.len(), 10_000);
        assert_eq!(submitted[0].reference_image_url, "https://x/img.png");
        assert_eq!(submitted[0].settings, GenerationSettings::default());
    }

    #[tokio::test]
    async fn submit_classifies_length_rejection() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_next_submit(BackendError::rejected(400, "Prompt is too long"));
        let orch = orchestrator(backend);
        let conv = conversation("c1");

        let err = orch.submit(&conv, &reply(&conv, "brief")).await.unwrap_err();
        assert!(matches!(err, GenerationError::PromptTooLong(_)));
    }

    #[tokio::test]
    async fn submit_rejects_blank_brief_without_calling_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let orch = orchestrator(backend.clone());
        let conv = conversation("c1");

        let err = orch.submit(&conv, &reply(&conv, "  ")).await.unwrap_err();
        assert_eq!(err, GenerationError::EmptyBrief);
        assert!(backend.submitted().is_empty());
    }

    #[tokio::test]
    async fn completed_job_pulls_artifacts_before_terminal_callback() {
        let backend = Arc::new(InMemoryBackend::new());
        let conv = conversation("c1");
        let scope = ArtifactScope::Conversation(conv.id().clone());
        backend.add_artifact(
            scope,
            Artifact::new(
                ArtifactId::new("a1").unwrap(),
                None,
                ArtifactKind::Video,
                "https://cdn/a1.mp4",
                Timestamp::now(),
            ),
        );
        backend.script_job_id(JobId::new("j1").unwrap());
        backend.script_statuses(
            JobId::new("j1").unwrap(),
            vec![
                processing(40),
                processing(80),
                Ok(JobStatusReport::new(JobState::Completed)),
            ],
        );
        let orch = orchestrator(backend.clone());
        let job = orch.submit(&conv, &reply(&conv, "brief")).await.unwrap();

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let handle = orch.watch(
            job,
            move |j| {
                let _ = progress_tx.send(j.progress().map(|p| p.percentage.value()));
            },
            move |outcome| {
                let _ = outcome_tx.send(outcome);
            },
        );

        let outcome = outcome_rx.recv().await.unwrap();
        handle.finished().await;

        let mut seen = Vec::new();
        while let Ok(p) = progress_rx.try_recv() {
            seen.push(p);
        }
        assert_eq!(seen, vec![Some(40), Some(80)]);
        match outcome {
            JobOutcome::Completed {
                artifacts,
                reconcile_error,
                ..
            } => {
                assert_eq!(artifacts.len(), 1);
                assert!(artifacts[0].is_latest);
                assert!(reconcile_error.is_none());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(backend.list_artifact_calls(), 1);
        assert_eq!(orch.active_watches(&ConversationId::new("c1").unwrap()), 0);
    }

    #[tokio::test]
    async fn reconcile_failure_is_reported_not_fabricated() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.script_job_id(JobId::new("j2").unwrap());
        backend.script_statuses(
            JobId::new("j2").unwrap(),
            vec![Ok(JobStatusReport::new(JobState::Completed))],
        );
        backend.fail_next_list_artifacts(BackendError::transient("503"));
        let orch = orchestrator(backend);
        let conv = conversation("c2");
        let job = orch.submit(&conv, &reply(&conv, "brief")).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        orch.watch(job, |_| {}, move |o| {
            let _ = tx.send(o);
        });

        match rx.recv().await.unwrap() {
            JobOutcome::Completed {
                artifacts,
                reconcile_error,
                ..
            } => {
                assert!(artifacts.is_empty());
                assert!(matches!(reconcile_error, Some(GenerationError::Reconcile(_))));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_job_reports_reason_without_pulling() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.script_job_id(JobId::new("j3").unwrap());
        backend.script_statuses(
            JobId::new("j3").unwrap(),
            vec![Ok(JobStatusReport::new(JobState::Failed).with_error("quota"))],
        );
        let orch = orchestrator(backend.clone());
        let conv = conversation("c3");
        let job = orch.submit(&conv, &reply(&conv, "brief")).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        orch.watch(job, |_| {}, move |o| {
            let _ = tx.send(o);
        });

        match rx.recv().await.unwrap() {
            outcome @ JobOutcome::Failed { .. } => {
                assert_eq!(outcome.error_code(), Some(ErrorCode::BackendRejected));
                if let JobOutcome::Failed { reason, .. } = outcome {
                    assert_eq!(reason, "quota");
                }
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(backend.list_artifact_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_job_expires() {
        let backend = Arc::new(InMemoryBackend::new());
        let orch = orchestrator(backend);
        let conv = conversation("c4");
        let job = orch.submit(&conv, &reply(&conv, "brief")).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        orch.watch(job, |_| {}, move |o| {
            let _ = tx.send(o);
        });

        let outcome = rx.recv().await.unwrap();
        assert!(matches!(outcome, JobOutcome::Expired { .. }));
        assert_eq!(outcome.job().state(), JobState::Queued);
        assert_eq!(outcome.error_code(), Some(ErrorCode::Expired));
    }

    #[tokio::test]
    async fn cancel_conversation_stops_its_watches() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.script_job_id(JobId::new("j5").unwrap());
        backend.script_statuses(JobId::new("j5").unwrap(), vec![processing(10)]);
        let orch = orchestrator(backend.clone());
        let conv = conversation("c5");
        let job = orch.submit(&conv, &reply(&conv, "brief")).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel::<JobOutcome>();
        let handle = orch.watch(job, |_| {}, move |o| {
            let _ = tx.send(o);
        });
        assert_eq!(orch.active_watches(conv.id()), 1);

        assert_eq!(orch.cancel_conversation(conv.id()), 1);
        handle.finished().await;

        let calls = backend.status_calls(&JobId::new("j5").unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(backend.status_calls(&JobId::new("j5").unwrap()), calls);
        assert!(rx.recv().await.is_none());
        assert_eq!(orch.cancel_conversation(conv.id()), 0);
    }

    #[tokio::test]
    async fn finished_watch_leaves_no_registry_entry() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.script_job_id(JobId::new("j6").unwrap());
        backend.script_statuses(
            JobId::new("j6").unwrap(),
            vec![Ok(JobStatusReport::new(JobState::Failed).with_error("quota"))],
        );
        let orch = orchestrator(backend);
        let conv = conversation("c6");
        let job = orch.submit(&conv, &reply(&conv, "brief")).await.unwrap();

        let handle = orch.watch(job, |_| {}, |_| {});
        handle.finished().await;

        assert!(!handle.is_active());
        assert!(!lock(&orch.watches).contains_key(conv.id()));
        assert_eq!(orch.cancel_conversation(conv.id()), 0);
    }

    #[test]
    fn cancelled_flag_suppresses_terminal_delivery() {
        let job = GenerationJob::submitted(
            JobId::new("j7").unwrap(),
            ConversationId::new("c7").unwrap(),
            GenerationSettings::default().provider,
        );
        let outcome = JobOutcome::Expired { job };
        let delivered = std::cell::Cell::new(0);

        deliver_unless_cancelled(&Mutex::new(true), |_| delivered.set(1), outcome.clone());
        assert_eq!(delivered.get(), 0);

        deliver_unless_cancelled(&Mutex::new(false), |_| delivered.set(2), outcome);
        assert_eq!(delivered.get(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_waits_for_a_terminal_callback_in_progress() {
        use std::sync::atomic::AtomicBool;

        let backend = Arc::new(InMemoryBackend::new());
        backend.script_job_id(JobId::new("j8").unwrap());
        backend.script_statuses(
            JobId::new("j8").unwrap(),
            vec![Ok(JobStatusReport::new(JobState::Failed).with_error("quota"))],
        );
        let orch = orchestrator(backend);
        let conv = conversation("c8");
        let job = orch.submit(&conv, &reply(&conv, "brief")).await.unwrap();

        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let returned = Arc::new(AtomicBool::new(false));
        let returned_in_callback = returned.clone();
        let handle = orch.watch(job, |_| {}, move |_| {
            let _ = entered_tx.send(());
            std::thread::sleep(Duration::from_millis(50));
            returned_in_callback.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        entered_rx.await.unwrap();
        handle.cancel();
        assert!(returned.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn close_conversation_closes_the_view_and_cancels_watches() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.script_job_id(JobId::new("j9").unwrap());
        backend.script_statuses(JobId::new("j9").unwrap(), vec![processing(10)]);
        let controller = ConversationController::new(
            backend.clone(),
            crate::application::conversation::ControllerOptions::default(),
        );
        let orch = orchestrator(backend.clone());
        let handle = controller
            .create(
                OwnerScope::new(
                    TenantId::new("t1").unwrap(),
                    crate::domain::foundation::SubjectId::new("p1").unwrap(),
                ),
                "https://x/img.png",
                GenerationSettings::default(),
            )
            .await
            .unwrap();
        let job = orch
            .submit(&handle.snapshot(), &reply(&handle.snapshot(), "brief"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel::<JobOutcome>();
        let watch = orch.watch(job, |_| {}, move |o| {
            let _ = tx.send(o);
        });

        assert_eq!(orch.close_conversation(&controller, &handle), 1);
        watch.finished().await;
        assert!(handle.is_closed());
        assert!(rx.recv().await.is_none());
        assert_eq!(orch.active_watches(handle.id()), 0);
        assert_eq!(orch.close_conversation(&controller, &handle), 0);
    }
}
