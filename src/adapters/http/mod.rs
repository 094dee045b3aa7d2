//! HTTP adapter - reqwest client for the generation backend.

mod client;
mod dto;

pub use client::{HttpBackendClient, HttpBackendConfig};
