//! Domain layer containing the generation workflow's types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, state machine)
//! - `conversation` - Conversation aggregate, settings, transcript filtering
//! - `generation` - Generation jobs, artifacts, rejection classification

pub mod conversation;
pub mod foundation;
pub mod generation;
