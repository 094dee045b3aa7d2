//! Adapters - Implementations of port interfaces.
//!
//! - `http` - the real backend over its JSON API
//! - `memory` - a scriptable in-process backend

pub mod http;
pub mod memory;

pub use http::{HttpBackendClient, HttpBackendConfig};
pub use memory::InMemoryBackend;
