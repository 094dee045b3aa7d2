//! Conversation aggregate.
//!
//! A conversation accumulates the dialogue that will brief a generation job.
//! It owns its message list and phase; the backend owns its id and storage.
//!
//! # Invariants
//!
//! - Message ids are unique within the list.
//! - Messages are append-only. The only in-place edits are removing a rolled
//!   back optimistic message and replacing an optimistic message with its
//!   confirmed server copy.
//! - `reference_image_url` never changes after construction.

use serde::{Deserialize, Serialize};

use super::message::{Message, Role};
use super::phase::ConversationPhase;
use super::settings::GenerationSettings;
use crate::domain::foundation::{
    ConversationId, DomainError, ErrorCode, MessageId, OwnerScope, StateMachine, Timestamp,
};

/// The complete generation brief returned by a finalize request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReply {
    pub conversation_id: ConversationId,
    pub text: String,
    pub received_at: Timestamp,
}

/// A generation conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    scope: OwnerScope,
    settings: GenerationSettings,
    reference_image_url: String,
    /// Image the backend derived (latest preview), if any.
    derived_image_url: Option<String>,
    messages: Vec<Message>,
    phase: ConversationPhase,
    last_final_reply: Option<FinalReply>,
}

impl Conversation {
    /// A freshly created conversation with no messages.
    pub fn created(
        id: ConversationId,
        scope: OwnerScope,
        settings: GenerationSettings,
        reference_image_url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            scope,
            settings,
            reference_image_url: reference_image_url.into(),
            derived_image_url: None,
            messages: Vec::new(),
            phase: ConversationPhase::Created,
            last_final_reply: None,
        }
    }

    /// Reattaches to an existing conversation from its filtered transcript.
    ///
    /// Duplicate message ids in `messages` keep their first occurrence.
    pub fn resumed(
        id: ConversationId,
        scope: OwnerScope,
        settings: GenerationSettings,
        reference_image_url: impl Into<String>,
        derived_image_url: Option<String>,
        messages: Vec<Message>,
    ) -> Self {
        let mut conversation = Self::created(id, scope, settings, reference_image_url);
        conversation.derived_image_url = derived_image_url.filter(|url| !url.trim().is_empty());
        for message in messages {
            if !conversation.contains(message.id()) {
                conversation.messages.push(message);
            }
        }
        if conversation.has_user_turn() {
            conversation.phase = ConversationPhase::Started;
        }
        conversation
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn scope(&self) -> &OwnerScope {
        &self.scope
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn reference_image_url(&self) -> &str {
        &self.reference_image_url
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn phase(&self) -> ConversationPhase {
        self.phase
    }

    pub fn last_final_reply(&self) -> Option<&FinalReply> {
        self.last_final_reply.as_ref()
    }

    /// The image generation should anchor on.
    ///
    /// The reference image set at creation always wins; otherwise the latest
    /// image derived by the backend or attached to an assistant turn.
    pub fn current_image_url(&self) -> Option<&str> {
        if !self.reference_image_url.trim().is_empty() {
            return Some(&self.reference_image_url);
        }
        self.messages
            .iter()
            .rev()
            .find_map(|m| m.image_url())
            .or(self.derived_image_url.as_deref())
    }

    /// At least one non-scaffold exchange is in the visible transcript.
    pub fn is_started(&self) -> bool {
        self.has_user_turn()
    }

    pub fn is_finalized(&self) -> bool {
        self.phase.is_finalized()
    }

    fn has_user_turn(&self) -> bool {
        self.messages.iter().any(|m| m.role() == Role::User)
    }

    fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| m.id() == id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a message.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if a message with the same id is already present
    pub fn append(&mut self, message: Message) -> Result<(), DomainError> {
        if self.contains(message.id()) {
            return Err(DomainError::validation(
                "message_id",
                format!("Duplicate message id {}", message.id()),
            ));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Removes a rolled back message. Returns true if it was present.
    pub fn remove(&mut self, id: &MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id() != id);
        self.messages.len() != before
    }

    /// Records an accepted (non-finalizing) exchange.
    pub fn mark_started(&mut self) -> Result<(), DomainError> {
        if self.phase == ConversationPhase::Created {
            self.transition(ConversationPhase::Started)?;
        }
        Ok(())
    }

    /// Records an accepted finalize request.
    pub fn mark_finalized(&mut self, reply: FinalReply) -> Result<(), DomainError> {
        self.transition(ConversationPhase::Finalized)?;
        self.last_final_reply = Some(reply);
        Ok(())
    }

    /// Updates the backend-derived preview image.
    pub fn set_derived_image_url(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.derived_image_url = Some(url);
        }
    }

    /// Replaces optimistic messages with their confirmed server copies.
    ///
    /// `confirmed` is the filtered server transcript, in chronological order,
    /// and becomes the new list. Server messages whose ids are already held
    /// locally are claimed first. Each optimistic message, in order, is then
    /// matched to the first unclaimed server message of the same role and
    /// content that comes after every earlier claim. Unmatched optimistic
    /// messages are kept at the end in their original order.
    pub fn reconcile_confirmed(&mut self, confirmed: Vec<Message>) {
        let mut claimed: Vec<bool> = confirmed
            .iter()
            .map(|server| {
                self.messages
                    .iter()
                    .any(|local| !local.is_optimistic() && local.id() == server.id())
            })
            .collect();
        // Position after the most recent claim; later turns only match past it.
        let mut cursor = claimed.iter().rposition(|c| *c).map_or(0, |i| i + 1);
        let mut pending = Vec::new();

        for local in self.messages.iter().filter(|m| m.is_optimistic()) {
            let matched = (cursor..confirmed.len()).find(|&i| {
                !claimed[i]
                    && confirmed[i].role() == local.role()
                    && confirmed[i].content() == local.content()
            });
            match matched {
                Some(i) => {
                    claimed[i] = true;
                    cursor = i + 1;
                }
                None => pending.push(local.clone()),
            }
        }

        let mut merged: Vec<Message> = Vec::with_capacity(confirmed.len() + pending.len());
        for message in confirmed.into_iter().chain(pending) {
            if !merged.iter().any(|m| m.id() == message.id()) {
                merged.push(message);
            }
        }
        self.messages = merged;

        if self.has_user_turn() && self.phase == ConversationPhase::Created {
            self.phase = ConversationPhase::Started;
        }
    }

    fn transition(&mut self, target: ConversationPhase) -> Result<(), DomainError> {
        self.phase = self.phase.transition_to(target).map_err(|e| {
            DomainError::new(ErrorCode::InvalidStateTransition, e.to_string())
                .with_detail("conversation_id", self.id.to_string())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{SubjectId, TenantId};

    fn scope() -> OwnerScope {
        OwnerScope::new(TenantId::new("t1").unwrap(), SubjectId::new("p1").unwrap())
    }

    fn conversation(image: &str) -> Conversation {
        Conversation::created(
            ConversationId::new("c1").unwrap(),
            scope(),
            GenerationSettings::default(),
            image,
        )
    }

    fn server(id: &str, role: Role, content: &str) -> Message {
        Message::confirmed(MessageId::server(id).unwrap(), role, content, Timestamp::now())
    }

    #[test]
    fn created_conversation_is_empty_and_not_started() {
        let c = conversation("https://x/img.png");
        assert!(c.messages().is_empty());
        assert!(!c.is_started());
        assert_eq!(c.phase(), ConversationPhase::Created);
    }

    #[test]
    fn append_rejects_duplicate_ids() {
        let mut c = conversation("");
        let msg = Message::optimistic(Role::User, "hi");
        c.append(msg.clone()).unwrap();
        assert!(c.append(msg).is_err());
        assert_eq!(c.messages().len(), 1);
    }

    #[test]
    fn remove_rolls_back_a_message() {
        let mut c = conversation("");
        let msg = Message::optimistic(Role::User, "hi");
        c.append(msg.clone()).unwrap();
        assert!(c.remove(msg.id()));
        assert!(!c.remove(msg.id()));
        assert!(c.messages().is_empty());
    }

    #[test]
    fn reference_image_wins_over_derived_images() {
        let mut c = conversation("https://x/ref.png");
        c.set_derived_image_url(Some("https://x/derived.png".into()));
        assert_eq!(c.current_image_url(), Some("https://x/ref.png"));
    }

    #[test]
    fn latest_message_image_used_without_reference() {
        let mut c = conversation("");
        c.set_derived_image_url(Some("https://x/derived.png".into()));
        assert_eq!(c.current_image_url(), Some("https://x/derived.png"));

        c.append(Message::optimistic(Role::Assistant, "v2").with_image_url("https://x/v2.png"))
            .unwrap();
        assert_eq!(c.current_image_url(), Some("https://x/v2.png"));
    }

    #[test]
    fn finalize_is_repeatable() {
        let mut c = conversation("");
        let reply = FinalReply {
            conversation_id: c.id().clone(),
            text: "brief".into(),
            received_at: Timestamp::now(),
        };
        c.mark_finalized(reply.clone()).unwrap();
        c.mark_finalized(reply).unwrap();
        assert!(c.is_finalized());
    }

    #[test]
    fn reconcile_replaces_optimistic_with_confirmed() {
        let mut c = conversation("");
        c.append(Message::optimistic(Role::User, "hello")).unwrap();
        c.append(Message::optimistic(Role::Assistant, "hi there")).unwrap();
        c.append(Message::optimistic(Role::User, "still sending")).unwrap();

        c.reconcile_confirmed(vec![
            server("m1", Role::User, "hello"),
            server("m2", Role::Assistant, "hi there"),
        ]);

        let ids: Vec<_> = c.messages().iter().map(|m| m.id().as_str().to_string()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "m1");
        assert_eq!(ids[1], "m2");
        assert!(c.messages()[2].is_optimistic());
        assert_eq!(c.messages()[2].content(), "still sending");
        assert_eq!(c.phase(), ConversationPhase::Started);
    }

    #[test]
    fn reconcile_keeps_unconfirmed_repeat_of_an_earlier_turn() {
        let mut c = Conversation::resumed(
            ConversationId::new("c1").unwrap(),
            scope(),
            GenerationSettings::default(),
            "",
            None,
            vec![server("m1", Role::User, "yes"), server("m2", Role::Assistant, "ok")],
        );
        c.append(Message::optimistic(Role::User, "yes")).unwrap();

        c.reconcile_confirmed(vec![
            server("m1", Role::User, "yes"),
            server("m2", Role::Assistant, "ok"),
        ]);

        let contents: Vec<_> = c.messages().iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["yes", "ok", "yes"]);
        assert!(c.messages()[2].is_optimistic());
    }

    #[test]
    fn reconcile_confirms_repeat_once_the_server_has_it() {
        let mut c = Conversation::resumed(
            ConversationId::new("c1").unwrap(),
            scope(),
            GenerationSettings::default(),
            "",
            None,
            vec![server("m1", Role::User, "yes"), server("m2", Role::Assistant, "ok")],
        );
        c.append(Message::optimistic(Role::User, "yes")).unwrap();

        c.reconcile_confirmed(vec![
            server("m1", Role::User, "yes"),
            server("m2", Role::Assistant, "ok"),
            server("m3", Role::User, "yes"),
        ]);

        let ids: Vec<_> = c.messages().iter().map(|m| m.id().as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn resumed_conversation_with_user_turns_is_started() {
        let c = Conversation::resumed(
            ConversationId::new("c9").unwrap(),
            scope(),
            GenerationSettings::default(),
            "",
            Some("  ".into()),
            vec![server("m1", Role::User, "hey"), server("m1", Role::Assistant, "dup")],
        );
        assert_eq!(c.messages().len(), 1);
        assert!(c.is_started());
        assert_eq!(c.phase(), ConversationPhase::Started);
        assert_eq!(c.current_image_url(), None);
    }
}
