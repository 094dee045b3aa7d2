//! ConversationController - lifecycle of generation conversations.
//!
//! Every operation talks to the backend once and surfaces failures as-is.
//! Nothing is retried here.
//!
//! # Sends
//!
//! A user turn is visible immediately as an optimistic message. On success
//! the assistant reply is appended after it; on failure the optimistic turn
//! is removed again. One send (or finalize) per conversation at a time; a
//! concurrent attempt fails with `Busy` without touching the transcript.

use std::sync::Arc;

use super::errors::ConversationError;
use super::handle::ConversationHandle;
use crate::domain::conversation::{
    Conversation, FinalReply, GenerationSettings, Message, MessageFilter, Role, FINALIZE_PROMPT,
};
use crate::domain::foundation::{ConversationId, OwnerScope, Timestamp};
use crate::ports::ConversationApi;

/// Behavior switches for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Allows creating conversations without a subject or reference image.
    pub no_product_mode: bool,
    /// Text sent with `finish = true` to request the final brief.
    pub finalize_prompt: String,
    /// Scaffold prompts recognized in addition to the built-in set.
    pub extra_scaffold_prompts: Vec<String>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            no_product_mode: false,
            finalize_prompt: FINALIZE_PROMPT.to_string(),
            extra_scaffold_prompts: Vec::new(),
        }
    }
}

pub struct ConversationController {
    api: Arc<dyn ConversationApi>,
    filter: MessageFilter,
    options: ControllerOptions,
}

impl ConversationController {
    pub fn new(api: Arc<dyn ConversationApi>, options: ControllerOptions) -> Self {
        let filter = MessageFilter::default()
            .with_extra_prompts(&options.extra_scaffold_prompts)
            .with_extra_prompts([options.finalize_prompt.as_str()]);
        Self {
            api,
            filter,
            options,
        }
    }

    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Creates a conversation on the backend.
    ///
    /// # Errors
    ///
    /// - `MissingReference` if the subject or reference image is absent
    ///   (both may be absent in no-product mode)
    /// - `Validation` if the settings are inconsistent
    pub async fn create(
        &self,
        scope: OwnerScope,
        reference_image_url: &str,
        settings: GenerationSettings,
    ) -> Result<ConversationHandle, ConversationError> {
        if !self.options.no_product_mode {
            if scope.subject_id.is_none() {
                return Err(ConversationError::missing_reference(
                    "a product is required to start a conversation",
                ));
            }
            if reference_image_url.trim().is_empty() {
                return Err(ConversationError::missing_reference(
                    "a reference image is required to start a conversation",
                ));
            }
        }
        settings.validate()?;

        let id = self
            .api
            .create_conversation(&scope, reference_image_url, &settings)
            .await?;

        tracing::info!(
            conversation_id = %id,
            tenant_id = %scope.tenant_id,
            provider = %settings.provider,
            "Conversation created"
        );
        Ok(ConversationHandle::new(Conversation::created(
            id,
            scope,
            settings,
            reference_image_url,
        )))
    }

    /// Reattaches to an existing conversation.
    ///
    /// Stored settings win; fields the backend did not store come from `hint`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the backend has no such conversation
    pub async fn resume(
        &self,
        scope: OwnerScope,
        id: ConversationId,
        hint: &GenerationSettings,
    ) -> Result<ConversationHandle, ConversationError> {
        let record = self
            .api
            .get_conversation(&scope, &id)
            .await
            .map_err(|e| ConversationError::from_backend(e, &id))?;

        let raw_len = record.messages.len();
        let messages = self.filter.filter_raw(record.messages);
        let settings = record.settings.unwrap_or_default().overlay(hint);

        tracing::info!(
            conversation_id = %id,
            raw_messages = raw_len,
            visible_messages = messages.len(),
            "Conversation resumed"
        );
        Ok(ConversationHandle::new(Conversation::resumed(
            id,
            scope,
            settings,
            record.reference_image_url.unwrap_or_default(),
            record.current_image_url,
            messages,
        )))
    }

    /// Re-fetches the transcript and swaps optimistic messages for their
    /// confirmed copies.
    pub async fn refresh(&self, handle: &ConversationHandle) -> Result<(), ConversationError> {
        let _gate = handle.begin_send()?;
        let scope = handle.read(|c| c.scope().clone());

        let record = self
            .api
            .get_conversation(&scope, handle.id())
            .await
            .map_err(|e| ConversationError::from_backend(e, handle.id()))?;
        let confirmed = self.filter.filter_raw(record.messages);

        handle.update(|c| {
            c.reconcile_confirmed(confirmed);
            c.set_derived_image_url(record.current_image_url);
        });
        tracing::debug!(conversation_id = %handle.id(), "Conversation refreshed");
        Ok(())
    }

    /// Sends one user turn and returns the assistant's reply.
    ///
    /// # Errors
    ///
    /// - `EmptyMessage` for blank text
    /// - `Busy` if another send is in flight
    /// - `Closed` after [`close`](Self::close)
    /// - backend failures, after the optimistic turn was rolled back
    pub async fn send(
        &self,
        handle: &ConversationHandle,
        text: &str,
    ) -> Result<Message, ConversationError> {
        if text.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        let _gate = handle.begin_send()?;

        let optimistic = Message::optimistic(Role::User, text);
        let optimistic_id = optimistic.id().clone();
        handle.update(|c| c.append(optimistic))?;

        let reply = match self.api.send_message(handle.id(), text, false).await {
            Ok(reply) => reply,
            Err(e) => {
                handle.update(|c| c.remove(&optimistic_id));
                tracing::warn!(
                    conversation_id = %handle.id(),
                    error = %e,
                    "Send failed, optimistic message rolled back"
                );
                return Err(ConversationError::from_backend(e, handle.id()));
            }
        };

        let mut assistant = Message::optimistic(Role::Assistant, reply.response_text);
        if let Some(url) = reply.image_url.clone() {
            assistant = assistant.with_image_url(url);
        }
        handle.update(|c| -> Result<(), ConversationError> {
            c.append(assistant.clone())?;
            c.mark_started()?;
            c.set_derived_image_url(reply.image_url);
            Ok(())
        })?;

        tracing::debug!(
            conversation_id = %handle.id(),
            messages = handle.read(|c| c.messages().len()),
            "Message exchanged"
        );
        Ok(assistant)
    }

    /// Asks the backend for the final generation brief.
    ///
    /// The finalize prompt and its reply are not added to the visible
    /// transcript. The brief is returned in full and also kept as the
    /// conversation's last final reply.
    pub async fn finalize(
        &self,
        handle: &ConversationHandle,
    ) -> Result<FinalReply, ConversationError> {
        let _gate = handle.begin_send()?;

        let reply = self
            .api
            .send_message(handle.id(), &self.options.finalize_prompt, true)
            .await
            .map_err(|e| {
                tracing::warn!(conversation_id = %handle.id(), error = %e, "Finalize failed");
                ConversationError::from_backend(e, handle.id())
            })?;

        if reply.response_text.trim().is_empty() {
            return Err(ConversationError::EmptyFinalReply);
        }

        let final_reply = FinalReply {
            conversation_id: handle.id().clone(),
            text: reply.response_text,
            received_at: Timestamp::now(),
        };
        handle.update(|c| -> Result<(), ConversationError> {
            c.mark_finalized(final_reply.clone())?;
            c.set_derived_image_url(reply.image_url);
            Ok(())
        })?;

        tracing::info!(
            conversation_id = %handle.id(),
            brief_len = final_reply.text.len(),
            "Conversation finalized"
        );
        Ok(final_reply)
    }

    /// Closes the view. Later sends fail with `Closed`; an in-flight send
    /// still completes. Returns true if this call closed it.
    ///
    /// Generation watches are not touched; use
    /// `GenerationOrchestrator::close_conversation` to end both.
    pub fn close(&self, handle: &ConversationHandle) -> bool {
        let closed = handle.close();
        if closed {
            tracing::info!(conversation_id = %handle.id(), "Conversation closed");
        }
        closed
    }
}
