//! Message entity for generation conversations.
//!
//! Messages are append-only records of user/assistant exchanges. A message sent
//! by the user first appears with a locally synthesized id; once the backend
//! transcript is fetched again it is replaced by the confirmed copy.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{MessageId, Timestamp};

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    timestamp: Timestamp,
    /// Preview image attached to the turn in modification-chat flows.
    image_url: Option<String>,
}

impl Message {
    /// Creates an optimistic message with a local id, stamped now.
    pub fn optimistic(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::local(),
            role,
            content: content.into(),
            timestamp: Timestamp::now(),
            image_url: None,
        }
    }

    /// Reconstitutes a message as reported by the backend.
    pub fn confirmed(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp,
            image_url: None,
        }
    }

    /// Attaches a preview image. Blank URLs are ignored.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.image_url = if url.trim().is_empty() { None } else { Some(url) };
        self
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Returns true if this message has not yet been confirmed by the backend.
    pub fn is_optimistic(&self) -> bool {
        self.id.is_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_messages_carry_local_ids() {
        let msg = Message::optimistic(Role::User, "make it punchier");
        assert!(msg.is_optimistic());
        assert!(msg.is_user());
        assert_eq!(msg.content(), "make it punchier");
    }

    #[test]
    fn confirmed_messages_keep_server_id_and_time() {
        let ts = Timestamp::from_unix_millis(1_700_000_000_000);
        let msg = Message::confirmed(MessageId::server("m-1").unwrap(), Role::Assistant, "ok", ts);
        assert!(!msg.is_optimistic());
        assert_eq!(msg.timestamp(), &ts);
        assert_eq!(msg.id().as_str(), "m-1");
    }

    #[test]
    fn blank_image_urls_are_dropped() {
        let msg = Message::optimistic(Role::Assistant, "preview").with_image_url("  ");
        assert_eq!(msg.image_url(), None);

        let msg = msg.with_image_url("https://cdn/x.png");
        assert_eq!(msg.image_url(), Some("https://cdn/x.png"));
    }
}
