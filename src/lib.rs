//! Adforge - conversational ad-variant generation.
//!
//! A user refines a generation brief with an assistant, finalizes it into a
//! job on the generation backend, and watches the job until its artifacts
//! are reconciled into the local library.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
