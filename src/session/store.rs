//! Interaction store collaborator contract
//!
//! The persistent store is an external collaborator; the trait below is its
//! interface boundary. `InMemoryInteractionStore` backs tests and small
//! deployments.

use super::{EntityRecord, InteractionId, Role, SessionId, Utterance};
use crate::entities::EntityMap;
use crate::{ConfabError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Persistence boundary for sessions, utterances, and extracted entities
pub trait InteractionStore: Send + Sync {
    /// Register a new bounded conversation
    fn create_session(&self) -> Result<SessionId>;

    /// Persist one utterance and return its id
    fn store_interaction(
        &self,
        session_id: SessionId,
        text: &str,
        role: Role,
    ) -> Result<InteractionId>;

    /// All utterances of a session, ordered by creation timestamp
    fn get_session_interactions(&self, session_id: SessionId) -> Result<Vec<Utterance>>;

    /// Attach extracted entities to an utterance; returns how many were stored
    fn store_entities(&self, interaction_id: InteractionId, entities: &EntityMap)
        -> Result<usize>;
}

/// Summary of one stored session, for reporting
#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub id: SessionId,
    pub start_time: DateTime<Utc>,
    pub interaction_count: usize,
}

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<SessionId, DateTime<Utc>>,
    interactions: HashMap<SessionId, Vec<Utterance>>,
    entities: HashMap<InteractionId, Vec<EntityRecord>>,
}

/// In-memory implementation of the interaction store
#[derive(Default)]
pub struct InMemoryInteractionStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities attached to one utterance
    pub fn interaction_entities(&self, interaction_id: InteractionId) -> Vec<EntityRecord> {
        self.inner
            .read()
            .entities
            .get(&interaction_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Summaries of every stored session
    pub fn all_sessions(&self) -> Vec<SessionSummary> {
        let inner = self.inner.read();
        let mut sessions: Vec<SessionSummary> = inner
            .sessions
            .iter()
            .map(|(&id, &start_time)| SessionSummary {
                id,
                start_time,
                interaction_count: inner.interactions.get(&id).map_or(0, Vec::len),
            })
            .collect();
        sessions.sort_by_key(|s| s.start_time);
        sessions
    }
}

impl InteractionStore for InMemoryInteractionStore {
    fn create_session(&self) -> Result<SessionId> {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write();
        inner.sessions.insert(id, Utc::now());
        inner.interactions.insert(id, Vec::new());
        debug!(session_id = %id, "created session");
        Ok(id)
    }

    fn store_interaction(
        &self,
        session_id: SessionId,
        text: &str,
        role: Role,
    ) -> Result<InteractionId> {
        let mut inner = self.inner.write();
        let interactions = inner
            .interactions
            .get_mut(&session_id)
            .ok_or_else(|| ConfabError::StoreError(format!("no such session: {}", session_id)))?;
        let utterance = Utterance::new(session_id, role, text);
        let id = utterance.id;
        interactions.push(utterance);
        debug!(session_id = %session_id, interaction_id = %id, role = role.as_str(), "stored interaction");
        Ok(id)
    }

    fn get_session_interactions(&self, session_id: SessionId) -> Result<Vec<Utterance>> {
        let inner = self.inner.read();
        let mut interactions = inner
            .interactions
            .get(&session_id)
            .ok_or_else(|| ConfabError::StoreError(format!("no such session: {}", session_id)))?
            .clone();
        interactions.sort_by_key(|u| u.timestamp);
        Ok(interactions)
    }

    fn store_entities(
        &self,
        interaction_id: InteractionId,
        entities: &EntityMap,
    ) -> Result<usize> {
        let records: Vec<EntityRecord> = entities
            .iter()
            .map(|(entity_type, value)| EntityRecord {
                entity_type: entity_type.clone(),
                value: value.clone(),
            })
            .collect();
        let count = records.len();
        self.inner
            .write()
            .entities
            .entry(interaction_id)
            .or_default()
            .extend(records);
        debug!(interaction_id = %interaction_id, count, "stored entities");
        Ok(count)
    }
}
