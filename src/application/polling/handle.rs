//! Handle to one running poll loop.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::domain::foundation::JobId;

#[derive(Debug, Default)]
struct LoopState {
    cancelled: bool,
    /// A terminal event was delivered, or the loop exited.
    finished: bool,
}

/// Shared control block between a poll loop and its handles.
#[derive(Debug)]
pub(super) struct PollControl {
    job_id: JobId,
    generation: u64,
    state: Mutex<LoopState>,
    shutdown: watch::Sender<bool>,
    done: watch::Sender<bool>,
}

impl PollControl {
    pub(super) fn new(job_id: JobId, generation: u64) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        let (done, _) = watch::channel(false);
        Arc::new(Self {
            job_id,
            generation,
            state: Mutex::new(LoopState::default()),
            shutdown,
            done,
        })
    }

    fn state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation
    }

    pub(super) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub(super) fn is_stopped(&self) -> bool {
        let state = self.state();
        state.cancelled || state.finished
    }

    /// Runs `deliver` only if the loop is still live, under the state lock.
    ///
    /// Holding the lock while delivering is what guarantees that nothing is
    /// delivered after `cancel` returns. A terminal delivery marks the loop
    /// finished so a second terminal event can never follow.
    pub(super) fn deliver_if_live(&self, terminal: bool, deliver: impl FnOnce() -> bool) -> bool {
        let mut state = self.state();
        if state.cancelled || state.finished {
            return false;
        }
        let delivered = deliver();
        if terminal || !delivered {
            state.finished = true;
        }
        delivered
    }

    pub(super) fn cancel(&self) -> bool {
        let newly_cancelled = {
            let mut state = self.state();
            if state.cancelled || state.finished {
                false
            } else {
                state.cancelled = true;
                true
            }
        };
        if newly_cancelled {
            self.shutdown.send_replace(true);
        }
        newly_cancelled
    }

    pub(super) fn mark_exited(&self) {
        self.state().finished = true;
        self.done.send_replace(true);
    }
}

/// Handle to a poll loop.
///
/// Cloning is cheap; every clone controls the same loop. Cancelling is
/// idempotent and safe after the loop already finished.
#[derive(Debug, Clone)]
pub struct PollHandle {
    control: Arc<PollControl>,
}

impl PollHandle {
    pub(super) fn new(control: Arc<PollControl>) -> Self {
        Self { control }
    }

    pub(super) fn control(&self) -> &Arc<PollControl> {
        &self.control
    }

    pub fn job_id(&self) -> &JobId {
        self.control.job_id()
    }

    /// Stops the loop. Returns true if this call did the stopping.
    ///
    /// After this returns no further event is delivered, and an in-flight
    /// status fetch is abandoned.
    pub fn cancel(&self) -> bool {
        let cancelled = self.control.cancel();
        if cancelled {
            tracing::debug!(job_id = %self.job_id(), "Poll loop cancelled");
        }
        cancelled
    }

    /// True until the loop is cancelled or reaches a terminal event.
    pub fn is_active(&self) -> bool {
        !self.control.is_stopped()
    }

    /// Waits until the loop task has exited.
    pub async fn finished(&self) {
        let mut done = self.control.done.subscribe();
        // Sender lives as long as the control block, so this only ends on `true`.
        let _ = done.wait_for(|exited| *exited).await;
    }
}
