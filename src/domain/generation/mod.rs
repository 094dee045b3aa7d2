//! Generation module - jobs, their states, and the artifacts they produce.

mod artifact;
mod job;
mod rejection;

pub use artifact::{rank_latest, Artifact, ArtifactKind, ArtifactScope};
pub use job::{GenerationJob, JobProgress, JobState, JobStatusReport, StatusChange};
pub use rejection::{is_prompt_too_long, PROMPT_TOO_LONG_PHRASES};
