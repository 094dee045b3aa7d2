//! Conversation module - dialogue that briefs a generation job.
//!
//! - `aggregate` - the conversation, its messages and final reply
//! - `phase` - lifecycle state machine
//! - `settings` - provider/platform/format settings
//! - `filter` - scaffolding removal over transcripts
//! - `scaffold` - the known backend prompt strings, as data

mod aggregate;
mod filter;
mod message;
mod phase;
mod scaffold;
mod settings;

pub use aggregate::{Conversation, FinalReply};
pub use filter::{MessageFilter, Transcript};
pub use message::{Message, Role};
pub use phase::ConversationPhase;
pub use scaffold::{FINALIZE_PROMPT, HIDDEN_SETUP_TURNS, SCAFFOLD_PROMPTS};
pub use settings::{AspectRatio, GenerationSettings, LanguageCode, Platform, Provider, SettingsPatch};
