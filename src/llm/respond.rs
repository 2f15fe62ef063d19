//! Response generation: conversation context assembly plus the completion call

use crate::llm::prompts::{APOLOGY_REPLY, ASSISTANT_SYSTEM_PROMPT};
use crate::llm::{ChatMessage, ChatModel};
use crate::session::{InteractionStore, Role, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds the conversation+memory context and calls the chat-completion service
pub struct ResponseGenerator {
    chat: Arc<dyn ChatModel>,
    store: Arc<dyn InteractionStore>,
    max_tokens: usize,
    temperature: f32,
    timeout: Duration,
}

impl ResponseGenerator {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        store: Arc<dyn InteractionStore>,
        max_tokens: usize,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            chat,
            store,
            max_tokens,
            temperature,
            timeout,
        }
    }

    /// Generate the assistant reply for one turn
    ///
    /// The completion call blocks for potentially multiple seconds; callers
    /// must run this off the connection-dispatch path. Any failure degrades
    /// to the fixed apology reply, which is treated as a valid utterance.
    pub async fn reply(&self, session_id: SessionId, memory_block: &str) -> String {
        let messages = match self.build_messages(session_id, memory_block) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to assemble context");
                return APOLOGY_REPLY.to_string();
            }
        };

        debug!(
            session_id = %session_id,
            messages = messages.len(),
            with_memory = !memory_block.is_empty(),
            "requesting completion"
        );

        let completion = tokio::time::timeout(
            self.timeout,
            self.chat
                .complete(&messages, self.max_tokens, self.temperature),
        )
        .await;

        match completion {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "generation failed, substituting apology");
                APOLOGY_REPLY.to_string()
            }
            Err(_) => {
                warn!(session_id = %session_id, timeout = ?self.timeout, "generation timed out, substituting apology");
                APOLOGY_REPLY.to_string()
            }
        }
    }

    /// One system message, then every prior utterance ordered by timestamp
    fn build_messages(
        &self,
        session_id: SessionId,
        memory_block: &str,
    ) -> crate::Result<Vec<ChatMessage>> {
        let system_content = if memory_block.is_empty() {
            ASSISTANT_SYSTEM_PROMPT.to_string()
        } else {
            format!("{}\n\n{}", ASSISTANT_SYSTEM_PROMPT, memory_block)
        };

        let mut messages = vec![ChatMessage::system(system_content)];

        let mut interactions = self.store.get_session_interactions(session_id)?;
        interactions.sort_by_key(|u| u.timestamp);

        for interaction in interactions {
            messages.push(match interaction.role {
                Role::Assistant => ChatMessage::assistant(interaction.text),
                Role::User => ChatMessage::user(interaction.text),
            });
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use crate::session::InMemoryInteractionStore;
    use crate::ConfabError;
    use async_trait::async_trait;

    struct ScriptedChat {
        reply: crate::Result<String>,
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _max_tokens: usize,
            _temperature: f32,
        ) -> crate::Result<String> {
            self.reply.clone()
        }
    }

    struct EchoingChat;

    #[async_trait]
    impl ChatModel for EchoingChat {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _max_tokens: usize,
            _temperature: f32,
        ) -> crate::Result<String> {
            Ok(serde_json::to_string(messages).unwrap())
        }
    }

    fn generator(chat: Arc<dyn ChatModel>, store: Arc<dyn InteractionStore>) -> ResponseGenerator {
        ResponseGenerator::new(chat, store, 200, 0.7, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_context_order_and_roles() {
        let store = Arc::new(InMemoryInteractionStore::new());
        let session = store.create_session().unwrap();
        store.store_interaction(session, "hi there", Role::User).unwrap();
        store
            .store_interaction(session, "hello!", Role::Assistant)
            .unwrap();
        store
            .store_interaction(session, "plan a party", Role::User)
            .unwrap();

        let generator = generator(Arc::new(EchoingChat), store);
        let reply = generator.reply(session, "").await;
        let messages: Vec<ChatMessage> = serde_json::from_str(&reply).unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, ASSISTANT_SYSTEM_PROMPT);
        assert_eq!(messages[1].content, "hi there");
        assert_eq!(messages[2].role, ChatRole::Assistant);
        assert_eq!(messages[3].content, "plan a party");
    }

    #[tokio::test]
    async fn test_memory_block_augments_system_prompt() {
        let store = Arc::new(InMemoryInteractionStore::new());
        let session = store.create_session().unwrap();

        let generator = generator(Arc::new(EchoingChat), store);
        let reply = generator.reply(session, "Earlier: budget was $500").await;
        let messages: Vec<ChatMessage> = serde_json::from_str(&reply).unwrap();

        assert!(messages[0].content.starts_with(ASSISTANT_SYSTEM_PROMPT));
        assert!(messages[0].content.contains("Earlier: budget was $500"));
    }

    #[tokio::test]
    async fn test_failure_substitutes_apology() {
        let store = Arc::new(InMemoryInteractionStore::new());
        let session = store.create_session().unwrap();

        let chat = Arc::new(ScriptedChat {
            reply: Err(ConfabError::GenerationError("service down".to_string())),
        });
        let generator = generator(chat, store);

        assert_eq!(generator.reply(session, "").await, APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn test_unknown_session_degrades_to_apology() {
        let store = Arc::new(InMemoryInteractionStore::new());
        let generator = generator(Arc::new(EchoingChat), store);

        let reply = generator.reply(uuid::Uuid::new_v4(), "").await;
        assert_eq!(reply, APOLOGY_REPLY);
    }
}
