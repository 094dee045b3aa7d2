//! Conversation lifecycle: create, resume, send, finalize, close.

mod controller;
mod errors;
mod handle;

pub use controller::{ControllerOptions, ConversationController};
pub use errors::ConversationError;
pub use handle::ConversationHandle;
