//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid backend base URL")]
    InvalidBaseUrl,

    #[error("Backend URL must use HTTPS in production")]
    BaseUrlMustBeHttps,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Poll interval must be between 1ms and 10 minutes")]
    InvalidPollInterval,

    #[error("Not-found threshold must be at least 1")]
    InvalidNotFoundThreshold,

    #[error("Finalize prompt must not be empty")]
    EmptyFinalizePrompt,

    #[error("Unknown log format: {0}")]
    UnknownLogFormat(String),
}
