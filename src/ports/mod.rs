//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between the
//! workflow and the generation backend. Adapters implement these ports.
//!
//! - `ConversationApi` - create, fetch, message and delete conversations
//! - `GenerationApi` - submit jobs, read job status, list artifacts
//! - `BackendError` - failure kinds shared by both ports

mod backend_error;
mod conversation_api;
mod generation_api;

pub use backend_error::BackendError;
pub use conversation_api::{ConversationApi, ConversationRecord, MessageReply};
pub use generation_api::{GenerationApi, SubmitJobRequest};
