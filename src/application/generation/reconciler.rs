//! ArtifactReconciler - merges fetched artifacts into a per-scope known set.
//!
//! The known set for a scope only grows. Every pull re-derives which artifact
//! is latest, so the flag moves as new artifacts land.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::foundation::ArtifactId;
use crate::domain::generation::{rank_latest, Artifact, ArtifactScope};
use crate::ports::{BackendError, GenerationApi};

type KnownSets = HashMap<ArtifactScope, HashMap<ArtifactId, Artifact>>;

/// Read-and-derive view over the backend's artifact listing.
pub struct ArtifactReconciler {
    api: Arc<dyn GenerationApi>,
    known: Mutex<KnownSets>,
}

impl ArtifactReconciler {
    pub fn new(api: Arc<dyn GenerationApi>) -> Self {
        Self {
            api,
            known: Mutex::new(HashMap::new()),
        }
    }

    fn known_sets(&self) -> MutexGuard<'_, KnownSets> {
        self.known.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetches the scope's artifacts and returns the merged set, newest first,
    /// with exactly one marked latest.
    ///
    /// On a fetch error the known set is left as it was.
    pub async fn pull(&self, scope: &ArtifactScope) -> Result<Vec<Artifact>, BackendError> {
        let fetched = self.api.list_artifacts(scope).await?;
        let fetched_count = fetched.len();

        let mut sets = self.known_sets();
        let known = sets.entry(scope.clone()).or_default();
        merge(known, fetched);
        let ranked = ranked(known);

        tracing::debug!(
            scope = %scope,
            fetched = fetched_count,
            known = ranked.len(),
            "Reconciled artifacts"
        );
        Ok(ranked)
    }

    /// Known set for a scope as of the last successful pull.
    pub fn known(&self, scope: &ArtifactScope) -> Vec<Artifact> {
        self.known_sets()
            .get(scope)
            .map(ranked)
            .unwrap_or_default()
    }
}

/// Adds fetched artifacts; a duplicate id keeps whichever copy is newer.
fn merge(known: &mut HashMap<ArtifactId, Artifact>, fetched: Vec<Artifact>) {
    for artifact in fetched {
        match known.get(&artifact.id) {
            Some(existing) if existing.created_at > artifact.created_at => {}
            _ => {
                known.insert(artifact.id.clone(), artifact);
            }
        }
    }
}

fn ranked(known: &HashMap<ArtifactId, Artifact>) -> Vec<Artifact> {
    let mut list: Vec<Artifact> = known.values().cloned().collect();
    rank_latest(&mut list);
    list
}
