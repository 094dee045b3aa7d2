//! Conversation API Port - the backend's dialogue endpoints.
//!
//! The backend owns conversation storage and the assistant that replies to
//! each turn. This port exposes the four calls the workflow needs (plus the
//! delete used only by the management collaborator).
//!
//! # Example
//!
//! ```ignore
//! let id = api.create_conversation(&scope, "https://x/img.png", &settings).await?;
//! let reply = api.send_message(&id, "Make it summery", false).await?;
//! println!("{}", reply.response_text);
//! ```

use async_trait::async_trait;

use super::BackendError;
use crate::domain::conversation::{GenerationSettings, Message, SettingsPatch};
use crate::domain::foundation::{ConversationId, OwnerScope};

/// Port for the backend's conversation endpoints.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Fetches the full, unfiltered transcript and stored metadata.
    ///
    /// Returns `BackendError::NotFound` if the conversation does not exist.
    async fn get_conversation(
        &self,
        scope: &OwnerScope,
        conversation_id: &ConversationId,
    ) -> Result<ConversationRecord, BackendError>;

    /// Sends one user turn. With `finish = true` the reply is the final
    /// generation brief.
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        finish: bool,
    ) -> Result<MessageReply, BackendError>;

    /// Creates a conversation and returns its backend id.
    async fn create_conversation(
        &self,
        scope: &OwnerScope,
        reference_image_url: &str,
        settings: &GenerationSettings,
    ) -> Result<ConversationId, BackendError>;

    /// Deletes a conversation. Not used by the workflow itself.
    async fn delete_conversation(
        &self,
        scope: &OwnerScope,
        conversation_id: &ConversationId,
    ) -> Result<(), BackendError>;
}

/// Stored conversation as returned by the backend.
#[derive(Debug, Clone, Default)]
pub struct ConversationRecord {
    /// Raw transcript, including hidden setup and scaffolding turns.
    pub messages: Vec<Message>,
    /// Latest image the backend derived for the conversation.
    pub current_image_url: Option<String>,
    /// Reference image given at creation, if the backend stored it.
    pub reference_image_url: Option<String>,
    /// Stored settings; any field may be absent.
    pub settings: Option<SettingsPatch>,
}

/// Backend reply to a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReply {
    pub response_text: String,
    /// Preview image produced for this turn (modification chat).
    pub image_url: Option<String>,
}

impl MessageReply {
    pub fn text(response_text: impl Into<String>) -> Self {
        Self {
            response_text: response_text.into(),
            image_url: None,
        }
    }
}
