//! Shared handle to one live conversation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, MutexGuard};

use super::errors::ConversationError;
use crate::domain::conversation::{Conversation, ConversationPhase, Message};
use crate::domain::foundation::ConversationId;

struct HandleInner {
    id: ConversationId,
    state: RwLock<Conversation>,
    /// Held for the duration of one send or finalize.
    send_gate: Mutex<()>,
    closed: AtomicBool,
}

/// A conversation owned by the controller.
///
/// Readers get snapshots; only the controller mutates the conversation, one
/// send at a time. Clones share the same conversation.
#[derive(Clone)]
pub struct ConversationHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for ConversationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHandle")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConversationHandle {
    pub(super) fn new(conversation: Conversation) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: conversation.id().clone(),
                state: RwLock::new(conversation),
                send_gate: Mutex::new(()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.inner.id
    }

    /// Point-in-time copy of the conversation.
    pub fn snapshot(&self) -> Conversation {
        self.read(Conversation::clone)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.read(|c| c.messages().to_vec())
    }

    pub fn phase(&self) -> ConversationPhase {
        self.read(Conversation::phase)
    }

    pub fn current_image_url(&self) -> Option<String> {
        self.read(|c| c.current_image_url().map(str::to_string))
    }

    /// A send or finalize is in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.send_gate.try_lock().is_err()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(super) fn read<R>(&self, f: impl FnOnce(&Conversation) -> R) -> R {
        let guard = self
            .inner
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    pub(super) fn update<R>(&self, f: impl FnOnce(&mut Conversation) -> R) -> R {
        let mut guard = self
            .inner
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Claims the single send slot, or fails if it is taken or the view is
    /// closed.
    pub(super) fn begin_send(&self) -> Result<MutexGuard<'_, ()>, ConversationError> {
        self.ensure_open()?;
        let gate = self
            .inner
            .send_gate
            .try_lock()
            .map_err(|_| ConversationError::Busy(self.id().clone()))?;
        self.ensure_open()?;
        Ok(gate)
    }

    pub(super) fn ensure_open(&self) -> Result<(), ConversationError> {
        if self.is_closed() {
            return Err(ConversationError::Closed(self.id().clone()));
        }
        Ok(())
    }

    /// Returns true if this call closed the view.
    pub(super) fn close(&self) -> bool {
        !self.inner.closed.swap(true, Ordering::AcqRel)
    }
}
