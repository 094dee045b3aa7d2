//! Generation job submission, tracking and artifact reconciliation.

mod errors;
mod orchestrator;
mod reconciler;
mod status_fetcher;

pub use errors::GenerationError;
pub use orchestrator::{GenerationOrchestrator, JobOutcome, WatchHandle};
pub use reconciler::ArtifactReconciler;
pub use status_fetcher::GenerationStatusFetcher;
