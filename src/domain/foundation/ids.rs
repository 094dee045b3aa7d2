//! Strongly-typed identifier value objects.
//!
//! Every identifier handed out by the generation backend is an opaque string.
//! The only identifier minted locally is the id of an optimistic message,
//! which carries a `local-` prefix until the server copy replaces it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Declares a non-empty, opaque, string-backed identifier.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, returning error if blank.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(id))
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

opaque_id!(
    /// Backend-assigned identifier of a generation conversation.
    ConversationId,
    "conversation_id"
);

opaque_id!(
    /// Backend-assigned identifier of a generation job.
    JobId,
    "job_id"
);

opaque_id!(
    /// Backend-assigned identifier of a generated artifact.
    ArtifactId,
    "artifact_id"
);

opaque_id!(
    /// Tenant (workspace/brand owner) that scopes every backend call.
    TenantId,
    "tenant_id"
);

opaque_id!(
    /// Subject (product) a conversation is about.
    SubjectId,
    "subject_id"
);

const LOCAL_PREFIX: &str = "local-";

/// Identifier of a message in a conversation transcript.
///
/// Optimistic messages get a synthesized `local-<uuid>` id; confirmed
/// messages carry the id the backend returned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Synthesizes a fresh local id for an optimistic message.
    pub fn local() -> Self {
        Self(format!("{}{}", LOCAL_PREFIX, Uuid::new_v4()))
    }

    /// Wraps a server-assigned id.
    pub fn server(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("message_id"));
        }
        if id.starts_with(LOCAL_PREFIX) {
            return Err(ValidationError::invalid_format(
                "message_id",
                "server ids cannot use the local prefix",
            ));
        }
        Ok(Self(id))
    }

    /// Returns true if this id was synthesized locally.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The (tenant, subject) pair required to address the backend.
///
/// `subject_id` is only optional when the deployment runs without products.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerScope {
    pub tenant_id: TenantId,
    pub subject_id: Option<SubjectId>,
}

impl OwnerScope {
    /// Creates a scope for a tenant and product.
    pub fn new(tenant_id: TenantId, subject_id: SubjectId) -> Self {
        Self {
            tenant_id,
            subject_id: Some(subject_id),
        }
    }

    /// Creates a scope with no product attached.
    pub fn without_subject(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            subject_id: None,
        }
    }
}
