//! Generated artifacts and the "latest" derivation over them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ArtifactId, ConversationId, JobId, SubjectId, TenantId, Timestamp};

/// Kind of generated media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
}

/// What a set of artifacts is associated with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactScope {
    Conversation(ConversationId),
    Subject {
        tenant_id: TenantId,
        subject_id: SubjectId,
    },
}

impl fmt::Display for ArtifactScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactScope::Conversation(id) => write!(f, "conversation:{}", id),
            ArtifactScope::Subject {
                tenant_id,
                subject_id,
            } => write!(f, "subject:{}/{}", tenant_id, subject_id),
        }
    }
}

/// A finished media item produced by a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    /// Back-reference to the producing job. Not an ownership pointer.
    pub source_job_id: Option<JobId>,
    pub kind: ArtifactKind,
    pub url: String,
    pub created_at: Timestamp,
    pub is_latest: bool,
}

impl Artifact {
    pub fn new(
        id: ArtifactId,
        source_job_id: Option<JobId>,
        kind: ArtifactKind,
        url: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            source_job_id,
            kind,
            url: url.into(),
            created_at,
            is_latest: false,
        }
    }
}

/// Sorts artifacts newest first and marks exactly the first as latest.
///
/// Ties on `created_at` are broken by descending id so the result does not
/// depend on input order.
pub fn rank_latest(artifacts: &mut [Artifact]) {
    artifacts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    for (i, artifact) in artifacts.iter_mut().enumerate() {
        artifact.is_latest = i == 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(id: &str, millis: i64) -> Artifact {
        Artifact::new(
            ArtifactId::new(id).unwrap(),
            None,
            ArtifactKind::Video,
            format!("https://cdn/{}.mp4", id),
            Timestamp::from_unix_millis(millis),
        )
    }

    #[test]
    fn newest_artifact_is_latest() {
        let mut set = vec![artifact("a", 1_000), artifact("c", 3_000), artifact("b", 2_000)];
        rank_latest(&mut set);

        let ids: Vec<_> = set.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert!(set[0].is_latest);
        assert_eq!(set.iter().filter(|a| a.is_latest).count(), 1);
    }

    #[test]
    fn ties_are_broken_deterministically() {
        let mut one = vec![artifact("x", 5), artifact("y", 5)];
        let mut two = vec![artifact("y", 5), artifact("x", 5)];
        rank_latest(&mut one);
        rank_latest(&mut two);
        assert_eq!(one, two);
    }

    #[test]
    fn empty_set_is_fine() {
        let mut set: Vec<Artifact> = Vec::new();
        rank_latest(&mut set);
        assert!(set.is_empty());
    }

    #[test]
    fn scope_displays_compactly() {
        let scope = ArtifactScope::Conversation(ConversationId::new("c1").unwrap());
        assert_eq!(scope.to_string(), "conversation:c1");
    }
}
