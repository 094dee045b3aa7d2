//! In-memory backend for tests and offline runs.

mod backend;

pub use backend::{InMemoryBackend, SentMessage};
