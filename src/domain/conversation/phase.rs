//! Lifecycle phase of a generation conversation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Phase of a conversation.
///
/// ```text
/// Uninitialized -> Created -> Started -> Finalized
///                     |                     ^  |
///                     +---------------------+  +-- (self: another cycle)
/// ```
///
/// `Finalized` does not block further sends; a conversation may be finalized
/// again to start another generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    #[default]
    Uninitialized,
    Created,
    Started,
    Finalized,
}

impl ConversationPhase {
    /// At least one non-scaffold exchange happened.
    pub fn is_started(&self) -> bool {
        matches!(self, ConversationPhase::Started | ConversationPhase::Finalized)
    }

    /// A finalize request has been accepted in this session.
    pub fn is_finalized(&self) -> bool {
        matches!(self, ConversationPhase::Finalized)
    }
}

impl StateMachine for ConversationPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConversationPhase::*;
        match self {
            Uninitialized => vec![Created],
            Created => vec![Started, Finalized],
            Started => vec![Finalized],
            Finalized => vec![Finalized],
        }
    }
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationPhase::Uninitialized => "uninitialized",
            ConversationPhase::Created => "created",
            ConversationPhase::Started => "started",
            ConversationPhase::Finalized => "finalized",
        };
        f.write_str(s)
    }
}
