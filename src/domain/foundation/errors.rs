//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i32,
        max: i32,
        actual: i32,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i32, max: i32, actual: i32) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    MissingReference,

    // Not found errors
    ConversationNotFound,

    // State errors
    InvalidStateTransition,
    ConversationBusy,
    ConversationClosed,
    Expired,

    // Backend errors
    PromptTooLong,
    BackendRejected,
    Unauthorized,
    TransientIo,
}

impl ErrorCode {
    /// Returns true if the caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::TransientIo | ErrorCode::ConversationBusy)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::MissingReference => "MISSING_REFERENCE",
            ErrorCode::ConversationNotFound => "CONVERSATION_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::ConversationBusy => "CONVERSATION_BUSY",
            ErrorCode::ConversationClosed => "CONVERSATION_CLOSED",
            ErrorCode::Expired => "EXPIRED",
            ErrorCode::PromptTooLong => "PROMPT_TOO_LONG",
            ErrorCode::BackendRejected => "BACKEND_REJECTED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::TransientIo => "TRANSIENT_IO",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        DomainError::validation(field, err.to_string())
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("conversation_id");
        assert_eq!(format!("{}", err), "Field 'conversation_id' cannot be empty");
    }

    #[test]
    fn validation_error_invalid_format_displays_correctly() {
        let err = ValidationError::invalid_format("language", "expected ISO-639-1 code");
        assert_eq!(
            format!("{}", err),
            "Field 'language' has invalid format: expected ISO-639-1 code"
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::PromptTooLong, "Brief rejected");
        assert_eq!(format!("{}", err), "[PROMPT_TOO_LONG] Brief rejected");
    }

    #[test]
    fn domain_error_from_validation_keeps_field() {
        let err: DomainError = ValidationError::empty_field("text").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field"), Some(&"text".to_string()));
    }

    #[test]
    fn only_transient_and_busy_are_retryable() {
        assert!(ErrorCode::TransientIo.is_retryable());
        assert!(ErrorCode::ConversationBusy.is_retryable());
        assert!(!ErrorCode::PromptTooLong.is_retryable());
        assert!(!ErrorCode::Expired.is_retryable());
    }

    #[test]
    fn expired_code_has_wire_name() {
        assert_eq!(ErrorCode::Expired.to_string(), "EXPIRED");
    }
}
