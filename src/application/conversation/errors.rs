//! Conversation-specific error types.

use thiserror::Error;

use crate::domain::foundation::{ConversationId, DomainError, ErrorCode, ValidationError};
use crate::domain::generation::is_prompt_too_long;
use crate::ports::BackendError;

/// Errors surfaced by the conversation controller. None are retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    /// Owner scope or reference image absent at creation.
    #[error("Missing reference: {0}")]
    MissingReference(String),

    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    /// Another send is in flight on this conversation.
    #[error("Conversation {0} is busy with another message")]
    Busy(ConversationId),

    #[error("Conversation {0} is closed")]
    Closed(ConversationId),

    #[error("Message text is empty")]
    EmptyMessage,

    /// Finalize returned no brief.
    #[error("Backend returned an empty final reply")]
    EmptyFinalReply,

    #[error("Final brief too long: {0}")]
    PromptTooLong(String),

    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not authorized")]
    Unauthorized,

    /// Network or server-side failure.
    #[error("Backend unavailable: {0}")]
    TransientIo(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("[{code}] {message}")]
    Domain { code: ErrorCode, message: String },
}

impl ConversationError {
    pub fn missing_reference(message: impl Into<String>) -> Self {
        ConversationError::MissingReference(message.into())
    }

    /// Maps a backend failure for an addressed conversation.
    pub fn from_backend(err: BackendError, id: &ConversationId) -> Self {
        match err {
            BackendError::NotFound => ConversationError::NotFound(id.clone()),
            other => other.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ConversationError::MissingReference(_) => ErrorCode::MissingReference,
            ConversationError::NotFound(_) => ErrorCode::ConversationNotFound,
            ConversationError::Busy(_) => ErrorCode::ConversationBusy,
            ConversationError::Closed(_) => ErrorCode::ConversationClosed,
            ConversationError::EmptyMessage | ConversationError::Validation(_) => {
                ErrorCode::ValidationFailed
            }
            ConversationError::EmptyFinalReply => ErrorCode::BackendRejected,
            ConversationError::PromptTooLong(_) => ErrorCode::PromptTooLong,
            ConversationError::Rejected { .. } => ErrorCode::BackendRejected,
            ConversationError::Unauthorized => ErrorCode::Unauthorized,
            ConversationError::TransientIo(_) => ErrorCode::TransientIo,
            ConversationError::Domain { code, .. } => *code,
        }
    }
}

impl From<BackendError> for ConversationError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected { status, message } => {
                if is_prompt_too_long(&message) {
                    ConversationError::PromptTooLong(message)
                } else {
                    ConversationError::Rejected { status, message }
                }
            }
            BackendError::Unauthorized => ConversationError::Unauthorized,
            BackendError::NotFound => ConversationError::Rejected {
                status: 404,
                message: "not found".to_string(),
            },
            other => ConversationError::TransientIo(other.to_string()),
        }
    }
}

impl From<ValidationError> for ConversationError {
    fn from(err: ValidationError) -> Self {
        ConversationError::Validation(err.to_string())
    }
}

impl From<DomainError> for ConversationError {
    fn from(err: DomainError) -> Self {
        ConversationError::Domain {
            code: err.code,
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ConversationId {
        ConversationId::new("c1").unwrap()
    }

    #[test]
    fn not_found_keeps_the_conversation_id() {
        let err = ConversationError::from_backend(BackendError::NotFound, &id());
        assert_eq!(err, ConversationError::NotFound(id()));
        assert_eq!(err.code(), ErrorCode::ConversationNotFound);
    }

    #[test]
    fn length_rejection_is_prompt_too_long() {
        let err = ConversationError::from_backend(
            BackendError::rejected(413, "Input is too long"),
            &id(),
        );
        assert_eq!(err.code(), ErrorCode::PromptTooLong);
    }

    #[test]
    fn server_errors_are_transient() {
        let err: ConversationError = BackendError::from_status(503, "down").into();
        assert_eq!(err.code(), ErrorCode::TransientIo);
    }

    #[test]
    fn busy_is_retryable() {
        assert!(ConversationError::Busy(id()).code().is_retryable());
    }

    #[test]
    fn domain_error_keeps_its_code() {
        let err: ConversationError =
            DomainError::new(ErrorCode::InvalidStateTransition, "nope").into();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
    }
}
