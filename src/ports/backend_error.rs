//! Errors returned by the generation backend ports.

use thiserror::Error;

/// Failure of a backend call.
///
/// `NotFound` is always kept distinct from other failures: the poller treats
/// it as a possible expiry signal and the controller maps it to a missing
/// conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Network failure or server-side error; safe to retry later.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// Request timed out.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Backend refused the request (validation and similar 4xx).
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Credentials missing or not accepted.
    #[error("unauthorized")]
    Unauthorized,

    /// Response body could not be understood.
    #[error("parse error: {0}")]
    Parse(String),
}

impl BackendError {
    pub fn transient(message: impl Into<String>) -> Self {
        BackendError::Transient(message.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        BackendError::Parse(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound)
    }

    /// Network-level or server-side failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_) | BackendError::Timeout { .. })
    }

    /// Maps an HTTP status and body to an error. Only called for non-2xx.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            404 => BackendError::NotFound,
            401 | 403 => BackendError::Unauthorized,
            408 | 429 | 500..=599 => {
                BackendError::Transient(format!("status {}: {}", status, body))
            }
            _ => BackendError::Rejected {
                status,
                message: body,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_maps_each_class() {
        assert_eq!(BackendError::from_status(404, ""), BackendError::NotFound);
        assert_eq!(BackendError::from_status(403, ""), BackendError::Unauthorized);
        assert!(BackendError::from_status(503, "down").is_transient());
        assert!(BackendError::from_status(429, "slow down").is_transient());
        assert_eq!(
            BackendError::from_status(422, "prompt too long"),
            BackendError::rejected(422, "prompt too long")
        );
    }

    #[test]
    fn not_found_is_not_transient() {
        assert!(BackendError::NotFound.is_not_found());
        assert!(!BackendError::NotFound.is_transient());
        assert!(BackendError::Timeout { timeout_secs: 5 }.is_transient());
    }
}
