//! Removal of backend-injected scaffolding turns from a transcript.
//!
//! A raw backend transcript starts with hidden setup turns and is interleaved
//! with prompt/reply pairs the backend uses to steer generation. Neither is
//! meant for display or for counting as user activity.
//!
//! Filtering is a pure function:
//!
//! 1. Drop the hidden setup prefix (only present on a raw transcript).
//! 2. Scan the remainder and drop, as atomic units:
//!    - `user(scaffold), user(scaffold), assistant` (checked first)
//!    - `user(scaffold), assistant`
//! 3. Repeat step 2 until nothing matches.
//!
//! The output records that it carries no hidden prefix, so filtering it again
//! is a no-op.

use super::message::{Message, Role};
use super::scaffold::{HIDDEN_SETUP_TURNS, SCAFFOLD_PROMPTS};

/// An ordered message list plus the number of hidden setup turns it still
/// carries at its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    hidden_setup_turns: usize,
}

impl Transcript {
    /// A transcript exactly as returned by the backend.
    pub fn raw(messages: Vec<Message>) -> Self {
        Self {
            messages,
            hidden_setup_turns: HIDDEN_SETUP_TURNS,
        }
    }

    /// A transcript that carries no hidden setup turns.
    pub fn visible(messages: Vec<Message>) -> Self {
        Self {
            messages,
            hidden_setup_turns: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn hidden_setup_turns(&self) -> usize {
        self.hidden_setup_turns
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Recognizes scaffolding prompts and strips them from transcripts.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    /// Lowercased, trimmed, non-empty prompt strings.
    prompts: Vec<String>,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self::new(SCAFFOLD_PROMPTS.iter().copied())
    }
}

impl MessageFilter {
    /// Creates a filter recognizing exactly the given prompts.
    pub fn new<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self { prompts: Vec::new() };
        filter.extend(prompts);
        filter
    }

    /// Adds prompts to the recognized set. Blank entries are ignored.
    pub fn with_extra_prompts<I, S>(mut self, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extend(prompts);
        self
    }

    fn extend<I, S>(&mut self, prompts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for prompt in prompts {
            let normalized = prompt.as_ref().trim().to_lowercase();
            if !normalized.is_empty() && !self.prompts.contains(&normalized) {
                self.prompts.push(normalized);
            }
        }
    }

    /// Number of recognized prompts.
    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }

    /// Returns true if `text` matches a known prompt, case-insensitively, as a
    /// substring in either direction. Blank text never matches.
    pub fn is_scaffold_text(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return false;
        }
        self.prompts
            .iter()
            .any(|prompt| text.contains(prompt.as_str()) || prompt.contains(text.as_str()))
    }

    fn is_scaffold_user(&self, message: &Message) -> bool {
        message.role() == Role::User && self.is_scaffold_text(message.content())
    }

    /// Filters a transcript down to the turns meant for display.
    pub fn filter(&self, transcript: Transcript) -> Transcript {
        let skip = transcript.hidden_setup_turns;
        let mut messages: Vec<Message> = transcript.messages.into_iter().skip(skip).collect();

        loop {
            let before = messages.len();
            messages = self.strip_once(messages);
            if messages.len() == before {
                break;
            }
        }

        Transcript::visible(messages)
    }

    /// Convenience wrapper over [`filter`](Self::filter) for a raw backend
    /// message list.
    pub fn filter_raw(&self, raw: Vec<Message>) -> Vec<Message> {
        self.filter(Transcript::raw(raw)).into_messages()
    }

    /// One greedy left-to-right pass.
    fn strip_once(&self, messages: Vec<Message>) -> Vec<Message> {
        let mut kept = Vec::with_capacity(messages.len());
        let mut i = 0;

        while i < messages.len() {
            let three_turn = i + 2 < messages.len()
                && self.is_scaffold_user(&messages[i])
                && self.is_scaffold_user(&messages[i + 1])
                && messages[i + 2].is_assistant();
            if three_turn {
                i += 3;
                continue;
            }

            let two_turn = i + 1 < messages.len()
                && self.is_scaffold_user(&messages[i])
                && messages[i + 1].is_assistant();
            if two_turn {
                i += 2;
                continue;
            }

            kept.push(messages[i].clone());
            i += 1;
        }

        kept
    }
}
