//! Chat-model entity-extraction strategy
//!
//! Sends the utterance with a fixed system prompt requesting strict JSON
//! over a closed schema, then flattens the nested contact object.

use super::EntityMap;
use crate::llm::prompts::ENTITY_SYSTEM_PROMPT;
use crate::llm::{ChatMessage, ChatModel};
use crate::{ConfabError, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Low temperature keeps the JSON output deterministic
const EXTRACTION_TEMPERATURE: f32 = 0.1;
const EXTRACTION_MAX_TOKENS: usize = 256;

pub struct LlmStrategy {
    chat: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl LlmStrategy {
    pub fn new(chat: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { chat, timeout }
    }

    /// Extract entities via the chat model
    ///
    /// Service errors, timeouts, and malformed JSON all surface as errors
    /// here; the caller degrades to the pattern-only result.
    pub async fn extract(&self, text: &str) -> Result<EntityMap> {
        let messages = [
            ChatMessage::system(ENTITY_SYSTEM_PROMPT),
            ChatMessage::user(text),
        ];

        let raw = tokio::time::timeout(
            self.timeout,
            self.chat
                .complete(&messages, EXTRACTION_MAX_TOKENS, EXTRACTION_TEMPERATURE),
        )
        .await
        .map_err(|_| ConfabError::Timeout(self.timeout))??;

        let entities = parse_entity_json(&raw)?;
        debug!(count = entities.len(), "model extraction parsed");
        Ok(entities)
    }
}

/// Parse the model's JSON reply and flatten `contacts` into `email`/`phone`
pub(crate) fn parse_entity_json(raw: &str) -> Result<EntityMap> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| ConfabError::ExtractionError(format!("invalid entity JSON: {}", e)))?;

    let Value::Object(object) = value else {
        return Err(ConfabError::ExtractionError(
            "entity reply is not a JSON object".to_string(),
        ));
    };

    let mut entities: EntityMap = object.into_iter().collect();

    if let Some(Value::Object(contacts)) = entities.remove("contacts") {
        for key in ["email", "phone"] {
            match contacts.get(key) {
                Some(Value::String(s)) if !s.is_empty() => {
                    entities.insert(key.to_string(), Value::String(s.clone()));
                }
                _ => {}
            }
        }
    }

    Ok(entities)
}
