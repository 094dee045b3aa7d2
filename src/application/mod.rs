//! Application layer - coordinates domain rules and ports.
//!
//! - `conversation` - conversation lifecycle and the single-send guard
//! - `generation` - job submission, watching and artifact reconciliation
//! - `polling` - the generic job-status poll loop

pub mod conversation;
pub mod generation;
pub mod polling;

pub use conversation::{
    ControllerOptions, ConversationController, ConversationError, ConversationHandle,
};
pub use generation::{
    ArtifactReconciler, GenerationError, GenerationOrchestrator, GenerationStatusFetcher,
    JobOutcome, WatchHandle,
};
pub use polling::{JobPoller, PollEvent, PollHandle, PollPolicy};
