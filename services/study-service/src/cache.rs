//! Artifact Cache
//!
//! Process-wide map from normalized document text to the artifact generated
//! for it. Entries live until the process exits.

use std::collections::HashMap;
use std::sync::Arc;
use studyforge_models::StudyArtifact;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct ArtifactCache {
    entries: Arc<RwLock<HashMap<String, StudyArtifact>>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get artifact from cache
    pub async fn get(&self, key: &str) -> Option<StudyArtifact> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    /// Set artifact in cache, returning the number of entries afterwards.
    pub async fn set(&self, key: String, artifact: StudyArtifact) -> usize {
        let mut entries = self.entries.write().await;
        entries.insert(key, artifact);
        entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
