//! Hybrid entity extraction
//!
//! Two independent strategies are always both attempted: a chat-model
//! strategy requesting strict JSON over a closed schema, and a deterministic
//! pattern strategy. One explicit merge function combines them with the
//! model taking precedence on key collisions.

pub mod llm;
pub mod patterns;

pub use llm::LlmStrategy;
pub use patterns::PatternStrategy;

use crate::llm::ChatModel;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Extracted entities keyed by type; values may be strings or lists
pub type EntityMap = BTreeMap<String, Value>;

/// Tagged result of one extraction attempt
#[derive(Clone, Debug, PartialEq)]
pub enum ExtractionOutcome {
    /// Both strategies contributed
    Full(EntityMap),
    /// The model strategy failed; pattern results only
    PatternOnly(EntityMap),
}

impl ExtractionOutcome {
    pub fn entities(&self) -> &EntityMap {
        match self {
            ExtractionOutcome::Full(map) | ExtractionOutcome::PatternOnly(map) => map,
        }
    }

    pub fn into_entities(self) -> EntityMap {
        match self {
            ExtractionOutcome::Full(map) | ExtractionOutcome::PatternOnly(map) => map,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ExtractionOutcome::PatternOnly(_))
    }
}

/// Merge law: pattern results overwritten key-by-key by model results
///
/// The model wins collisions; patterns fill the gaps the model omitted.
pub fn merge(pattern: EntityMap, llm: EntityMap) -> EntityMap {
    let mut merged = pattern;
    merged.extend(llm);
    merged
}

/// Derives structured facts from an utterance
pub struct EntityExtractor {
    llm: LlmStrategy,
    patterns: PatternStrategy,
}

impl EntityExtractor {
    pub fn new(chat: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self {
            llm: LlmStrategy::new(chat, timeout),
            patterns: PatternStrategy::new(),
        }
    }

    /// Extract entities from the utterance text
    ///
    /// Empty or whitespace-only input short-circuits to an empty result
    /// without invoking either strategy. Model failure degrades to the
    /// pattern-only result; this method never returns an error.
    pub async fn extract(&self, text: &str) -> ExtractionOutcome {
        if text.trim().is_empty() {
            return ExtractionOutcome::Full(EntityMap::new());
        }

        let pattern_entities = self.patterns.extract(text);

        match self.llm.extract(text).await {
            Ok(llm_entities) => {
                debug!(
                    pattern = pattern_entities.len(),
                    llm = llm_entities.len(),
                    "merging extraction strategies"
                );
                ExtractionOutcome::Full(merge(pattern_entities, llm_entities))
            }
            Err(e) => {
                warn!(error = %e, "model extraction failed, falling back to patterns");
                ExtractionOutcome::PatternOnly(pattern_entities)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use crate::ConfabError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedChat {
        reply: crate::Result<String>,
        calls: AtomicUsize,
    }

    impl ScriptedChat {
        fn new(reply: crate::Result<String>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _max_tokens: usize,
            _temperature: f32,
        ) -> crate::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn extractor(chat: Arc<ScriptedChat>) -> EntityExtractor {
        EntityExtractor::new(chat, Duration::from_secs(5))
    }

    #[test]
    fn test_merge_llm_wins_collisions_patterns_fill_gaps() {
        let mut pattern = EntityMap::new();
        pattern.insert("time".to_string(), json!("3 PM"));
        pattern.insert("budget".to_string(), json!("$500"));

        let mut llm = EntityMap::new();
        llm.insert("time".to_string(), json!("3:00 PM"));
        llm.insert("people".to_string(), json!(["Ada"]));

        let merged = merge(pattern, llm);
        assert_eq!(merged["time"], json!("3:00 PM"));
        assert_eq!(merged["budget"], json!("$500"));
        assert_eq!(merged["people"], json!(["Ada"]));
    }

    #[tokio::test]
    async fn test_blank_input_invokes_neither_strategy() {
        let chat = Arc::new(ScriptedChat::new(Ok("{}".to_string())));
        let extractor = extractor(Arc::clone(&chat));

        for text in ["", "   ", "\n\t"] {
            let outcome = extractor.extract(text).await;
            assert_eq!(outcome, ExtractionOutcome::Full(EntityMap::new()));
        }
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_pattern_only() {
        let chat = Arc::new(ScriptedChat::new(Err(ConfabError::GenerationError(
            "unavailable".to_string(),
        ))));
        let extractor = extractor(chat);

        let text = "Meeting at 3 PM at the Grand Hotel for 20 people, budget $500";
        let outcome = extractor.extract(text).await;
        assert!(outcome.is_degraded());

        let expected = PatternStrategy::new().extract(text);
        assert_eq!(outcome.entities(), &expected);
    }

    #[tokio::test]
    async fn test_full_extraction_merges_both() {
        let chat = Arc::new(ScriptedChat::new(Ok(
            r#"{"location": "Grand Hotel", "people": ["Ada"]}"#.to_string(),
        )));
        let extractor = extractor(chat);

        let outcome = extractor
            .extract("Meeting at 3 PM at the Grand Hotel")
            .await;
        assert!(!outcome.is_degraded());

        let entities = outcome.entities();
        // Model value replaces the pattern's longer location capture
        assert_eq!(entities["location"], json!("Grand Hotel"));
        assert_eq!(entities["people"], json!(["Ada"]));
        assert_eq!(entities["time"], json!("3 PM"));
        assert_eq!(entities["event_type"], json!("meeting"));
    }
}
