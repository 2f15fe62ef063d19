//! Session and utterance data model

pub mod store;

pub use store::{InMemoryInteractionStore, InteractionStore, SessionSummary};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type SessionId = Uuid;
pub type InteractionId = Uuid;

/// Who produced an utterance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One transcribed unit of speech attributed to a single role
///
/// Immutable once created; ordered by creation timestamp within a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Utterance {
    pub id: InteractionId,
    pub session_id: SessionId,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    pub fn new(session_id: SessionId, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A structured fact attached to exactly one utterance
///
/// No uniqueness constraint across types; values may be strings or lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub value: Value,
}
