//! Retrieval-augmented memory
//!
//! Persists one embedding per user utterance and retrieves semantically
//! related past utterances for prompt augmentation. Ranking is a brute-force
//! cosine-similarity scan; a real vector index is deliberately out of scope.

use crate::session::SessionId;
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// External embedding service
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Convert text into a fixed-dimensional semantic vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// One stored utterance embedding; never mutated after creation
#[derive(Clone, Debug)]
pub struct MemoryEmbedding {
    pub utterance_id: Uuid,
    pub session_id: SessionId,
    pub vector: Vec<f32>,
    pub source_text: String,
}

/// Embedding store with nearest-neighbor retrieval
///
/// Every failure is contained here: a broken embedder means "no memory
/// available", never an aborted turn.
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<MemoryEmbedding>>,
    timeout: Duration,
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>, timeout: Duration) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
            timeout,
        }
    }

    /// Persist an embedding for one user utterance
    ///
    /// Called at most once per utterance, after the turn's reply has been
    /// generated, so retrieval never sees an utterance as its own "past".
    pub async fn store(&self, session_id: SessionId, utterance_id: Uuid, text: &str) {
        if self
            .entries
            .read()
            .iter()
            .any(|e| e.utterance_id == utterance_id)
        {
            debug!(utterance_id = %utterance_id, "embedding already stored");
            return;
        }

        let vector = match self.embed_bounded(text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(utterance_id = %utterance_id, error = %e, "embedding failed, skipping memory write");
                return;
            }
        };

        self.entries.write().push(MemoryEmbedding {
            utterance_id,
            session_id,
            vector,
            source_text: text.to_string(),
        });
        debug!(utterance_id = %utterance_id, "stored utterance embedding");
    }

    /// Retrieve the most similar past utterances as one formatted block
    ///
    /// Returns the empty string when the store is empty, nothing matches, or
    /// the embedder fails.
    pub async fn retrieve(&self, query: &str, limit: usize, prefix: &str) -> String {
        if limit == 0 || self.entries.read().is_empty() {
            return String::new();
        }

        let query_vector = match self.embed_bounded(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "query embedding failed, treating as no memory");
                return String::new();
            }
        };

        let entries = self.entries.read();
        let mut scored: Vec<(f32, &MemoryEmbedding)> = entries
            .iter()
            .map(|entry| (cosine_similarity(&query_vector, &entry.vector), entry))
            .filter(|(score, _)| score.is_finite())
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let matched: Vec<String> = scored
            .iter()
            .take(limit)
            .map(|(_, entry)| format!("- {}", entry.source_text))
            .collect();

        if matched.is_empty() {
            return String::new();
        }

        debug!(matches = matched.len(), "retrieved memory block");
        format!("{}\n{}", prefix, matched.join("\n"))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    async fn embed_bounded(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::timeout(self.timeout, self.embedder.embed(text))
            .await
            .map_err(|_| crate::ConfabError::Timeout(self.timeout))?
    }
}

/// Cosine similarity between two vectors; 0.0 when either norm vanishes
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfabError;

    /// Maps known words onto fixed axis-aligned vectors
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lowered = text.to_lowercase();
            Ok(vec![
                if lowered.contains("party") { 1.0 } else { 0.0 },
                if lowered.contains("budget") { 1.0 } else { 0.0 },
                if lowered.contains("venue") { 1.0 } else { 0.0 },
            ])
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(ConfabError::EmbeddingError("offline".to_string()))
        }
    }

    fn store(embedder: Arc<dyn Embedder>) -> MemoryStore {
        MemoryStore::new(embedder, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty_string() {
        let memory = store(Arc::new(KeywordEmbedder));
        let block = memory.retrieve("anything", 3, "Earlier:").await;
        assert_eq!(block, "");
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_similarity() {
        let memory = store(Arc::new(KeywordEmbedder));
        let session = Uuid::new_v4();
        memory
            .store(session, Uuid::new_v4(), "a party for twenty")
            .await;
        memory
            .store(session, Uuid::new_v4(), "the budget is tight")
            .await;

        let block = memory.retrieve("another party soon", 1, "Earlier:").await;
        assert_eq!(block, "Earlier:\n- a party for twenty");
    }

    #[tokio::test]
    async fn test_retrieve_respects_limit_and_prefix() {
        let memory = store(Arc::new(KeywordEmbedder));
        let session = Uuid::new_v4();
        for text in ["party one", "party two", "party three"] {
            memory.store(session, Uuid::new_v4(), text).await;
        }

        let block = memory.retrieve("party", 2, "Context:").await;
        assert!(block.starts_with("Context:\n"));
        assert_eq!(block.lines().count(), 3); // prefix plus two matches
    }

    #[tokio::test]
    async fn test_store_is_idempotent_per_utterance() {
        let memory = store(Arc::new(KeywordEmbedder));
        let session = Uuid::new_v4();
        let utterance = Uuid::new_v4();

        memory.store(session, utterance, "party").await;
        memory.store(session, utterance, "party").await;
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn test_embedder_failure_is_contained() {
        let memory = store(Arc::new(FailingEmbedder));
        let session = Uuid::new_v4();

        memory.store(session, Uuid::new_v4(), "party").await;
        assert!(memory.is_empty());

        let block = memory.retrieve("party", 3, "Earlier:").await;
        assert_eq!(block, "");
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
