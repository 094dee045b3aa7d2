//! Generation-specific error types.

use thiserror::Error;

use crate::application::conversation::ConversationError;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::generation::is_prompt_too_long;
use crate::ports::BackendError;

/// Errors from submitting or tracking a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Generation brief is empty")]
    EmptyBrief,

    /// Backend refused the brief as too long for the provider.
    #[error("Brief too long: {0}")]
    PromptTooLong(String),

    #[error("Generation rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not authorized to generate")]
    Unauthorized,

    /// Network or server-side failure.
    #[error("Backend unavailable: {0}")]
    TransientIo(String),

    /// Artifact listing could not be read.
    #[error("Could not list artifacts: {0}")]
    Reconcile(String),

    /// Finalizing the conversation failed before anything was submitted.
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

impl GenerationError {
    /// Classifies a submission failure. Rejections whose message reads as a
    /// length complaint become `PromptTooLong`.
    pub fn from_submit(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { status, message } => {
                if is_prompt_too_long(&message) {
                    GenerationError::PromptTooLong(message)
                } else {
                    GenerationError::Rejected { status, message }
                }
            }
            BackendError::Unauthorized => GenerationError::Unauthorized,
            BackendError::NotFound => GenerationError::Rejected {
                status: 404,
                message: "conversation not found".to_string(),
            },
            other => GenerationError::TransientIo(other.to_string()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            GenerationError::EmptyBrief => ErrorCode::ValidationFailed,
            GenerationError::PromptTooLong(_) => ErrorCode::PromptTooLong,
            GenerationError::Rejected { .. } => ErrorCode::BackendRejected,
            GenerationError::Unauthorized => ErrorCode::Unauthorized,
            GenerationError::TransientIo(_) | GenerationError::Reconcile(_) => {
                ErrorCode::TransientIo
            }
            GenerationError::Conversation(err) => err.code(),
        }
    }
}

impl From<BackendError> for GenerationError {
    fn from(err: BackendError) -> Self {
        GenerationError::from_submit(err)
    }
}

impl From<GenerationError> for DomainError {
    fn from(err: GenerationError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_rejection_is_prompt_too_long() {
        let err = GenerationError::from_submit(BackendError::rejected(
            400,
            "Prompt is too long for this model",
        ));
        assert!(matches!(err, GenerationError::PromptTooLong(_)));
        assert_eq!(err.code(), ErrorCode::PromptTooLong);
    }

    #[test]
    fn other_rejection_stays_rejected() {
        let err = GenerationError::from_submit(BackendError::rejected(422, "bad platform"));
        assert_eq!(
            err,
            GenerationError::Rejected {
                status: 422,
                message: "bad platform".into()
            }
        );
    }

    #[test]
    fn network_failures_are_transient() {
        let err = GenerationError::from_submit(BackendError::Timeout { timeout_secs: 30 });
        assert_eq!(err.code(), ErrorCode::TransientIo);
        assert!(err.code().is_retryable());
    }

    #[test]
    fn converts_into_domain_error() {
        let err: DomainError = GenerationError::EmptyBrief.into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
