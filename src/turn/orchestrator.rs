//! Turn orchestrator: sequences the pipeline stages for each session
//!
//! Audio-chunk ingestion stays cheap and non-blocking on the caller's
//! dispatch path; the blocking transcription and generation calls run on a
//! per-turn worker thread. Every turn terminates in `Idle` with exactly one
//! terminal `ready` status, regardless of which branch executed or which
//! stage failed.

use crate::audio::{AudioIngestor, VadSignal};
use crate::config::PipelineConfig;
use crate::entities::EntityExtractor;
use crate::llm::{ChatModel, ResponseGenerator};
use crate::memory::{Embedder, MemoryStore};
use crate::session::{InteractionStore, Role, SessionId};
use crate::speech::{TranscriptOutcome, TranscriptionStage, Transcriber, TtsRenderer};
use crate::turn::context::{TurnContext, TurnState};
use crate::turn::events::{EventSink, PipelineStatus, ThinkingPhase, TurnEvent};
use crate::{ConfabError, Result};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

struct SessionEntry {
    context: TurnContext,
    sink: EventSink,
    cancelled: Arc<AtomicBool>,
}

type SessionMap = Arc<Mutex<HashMap<SessionId, SessionEntry>>>;

/// Shared stage dependencies handed to turn workers
struct TurnDeps {
    transcription: TranscriptionStage,
    extractor: EntityExtractor,
    memory: MemoryStore,
    responder: ResponseGenerator,
    store: Arc<dyn InteractionStore>,
    tts: Option<Arc<dyn TtsRenderer>>,
    memory_limit: usize,
    memory_prefix: String,
}

/// Result of one turn worker run
enum TurnOutcome {
    /// Transcription produced nothing; downstream stages untouched
    NoTranscript,
    /// Full pipeline ran and the reply went out
    Completed { reply: String },
    /// A collaborator failed; an error event was emitted
    Failed,
    /// The session was closed or reset mid-turn; results discarded
    Cancelled,
}

/// Coordinates VAD, transcription, extraction, memory, and response
/// generation per session
pub struct TurnOrchestrator {
    config: PipelineConfig,
    deps: Arc<TurnDeps>,
    runtime: Arc<Runtime>,
    sessions: SessionMap,
}

impl TurnOrchestrator {
    pub fn builder() -> TurnOrchestratorBuilder {
        TurnOrchestratorBuilder::new()
    }

    /// Register a new session and return its id plus its event stream
    pub fn open_session(&self) -> Result<(SessionId, Receiver<TurnEvent>)> {
        let session_id = self.deps.store.create_session()?;
        let (sink, rx) = EventSink::new();
        let ingestor = AudioIngestor::new(
            self.config.energy_threshold,
            self.config.silence_threshold,
            self.config.min_chunk_samples,
        );
        let entry = SessionEntry {
            context: TurnContext::new(session_id, ingestor),
            sink,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        self.sessions.lock().insert(session_id, entry);
        info!(session_id = %session_id, "session opened");
        Ok((session_id, rx))
    }

    /// Feed one audio chunk into a session
    ///
    /// Cheap and non-blocking; safe to call from the connection-dispatch
    /// path. Chunks arriving while a turn is already in flight are dropped
    /// with a logged notice.
    pub fn handle_chunk(&self, session_id: SessionId, samples: &[f32]) -> Result<()> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(ConfabError::UnknownSession(session_id))?;

        if entry.context.state().is_in_flight() {
            debug!(session_id = %session_id, "turn in flight, dropping audio chunk");
            entry.context.note("dropped chunk while turn in flight");
            return Ok(());
        }

        match entry.context.add_chunk(samples) {
            Some(VadSignal::Listening) => entry.sink.status(PipelineStatus::Listening),
            Some(VadSignal::Processing) => {
                entry.sink.status(PipelineStatus::Processing);
                let buffer = entry.context.take_buffer();
                entry.context.set_state(TurnState::Transcribing);
                let sink = entry.sink.clone();
                let cancelled = Arc::clone(&entry.cancelled);
                drop(sessions);
                self.spawn_turn(session_id, buffer, sink, cancelled);
            }
            None => {}
        }
        Ok(())
    }

    /// Remove a session; an in-flight turn discards its results
    pub fn close_session(&self, session_id: SessionId) -> Result<()> {
        let entry = self
            .sessions
            .lock()
            .remove(&session_id)
            .ok_or(ConfabError::UnknownSession(session_id))?;
        entry.cancelled.store(true, Ordering::SeqCst);
        info!(session_id = %session_id, "session closed");
        Ok(())
    }

    /// Clear a session's buffer and return it to `Idle`
    ///
    /// An in-flight turn is cancelled; its results are discarded on return.
    pub fn reset_session(&self, session_id: SessionId) -> Result<()> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(ConfabError::UnknownSession(session_id))?;
        if entry.context.state().is_in_flight() {
            entry.cancelled.store(true, Ordering::SeqCst);
            entry.cancelled = Arc::new(AtomicBool::new(false));
        }
        entry.context.take_buffer();
        entry.context.finish_turn();
        debug!(session_id = %session_id, "session reset");
        Ok(())
    }

    pub fn session_state(&self, session_id: SessionId) -> Option<TurnState> {
        self.sessions
            .lock()
            .get(&session_id)
            .map(|entry| entry.context.state())
    }

    pub fn session_buffer_is_empty(&self, session_id: SessionId) -> Option<bool> {
        self.sessions
            .lock()
            .get(&session_id)
            .map(|entry| entry.context.buffer_is_empty())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.deps.memory
    }

    fn spawn_turn(
        &self,
        session_id: SessionId,
        buffer: Vec<Vec<f32>>,
        sink: EventSink,
        cancelled: Arc<AtomicBool>,
    ) {
        let deps = Arc::clone(&self.deps);
        let runtime = Arc::clone(&self.runtime);
        let sessions = Arc::clone(&self.sessions);
        let dispatch_sink = sink.clone();

        let spawned = thread::Builder::new()
            .name(format!("turn-{}", session_id))
            .spawn(move || {
                let outcome = runtime.block_on(run_turn(
                    &deps, session_id, buffer, &sink, &cancelled, &sessions,
                ));

                // Reset and terminal ready are published under the sessions
                // lock; the dispatch path takes the same lock, so no later
                // chunk's events can land ahead of this turn's ready
                {
                    let mut sessions = sessions.lock();
                    if let Some(entry) = sessions.get_mut(&session_id) {
                        entry.context.finish_turn();
                    }
                    // Exactly one terminal ready per turn on every branch
                    sink.status(PipelineStatus::Ready);
                }

                // TTS runs after the turn has fully completed, off the hot path
                if let TurnOutcome::Completed { reply } = outcome {
                    if !cancelled.load(Ordering::SeqCst) {
                        if let Some(tts) = &deps.tts {
                            match tts.render(&reply) {
                                Ok(audio) => {
                                    debug!(bytes = audio.len(), "rendered reply audio")
                                }
                                Err(e) => warn!(error = %e, "TTS rendering failed"),
                            }
                        }
                    }
                }
            });

        if let Err(e) = spawned {
            // Worker never started; terminate the turn here instead
            error!(session_id = %session_id, error = %e, "failed to spawn turn worker");
            dispatch_sink.error("Processing failed");
            let mut sessions = self.sessions.lock();
            if let Some(entry) = sessions.get_mut(&session_id) {
                entry.context.finish_turn();
            }
            dispatch_sink.status(PipelineStatus::Ready);
        }
    }
}

fn set_session_state(sessions: &SessionMap, session_id: SessionId, state: TurnState) {
    if let Some(entry) = sessions.lock().get_mut(&session_id) {
        entry.context.set_state(state);
    }
}

/// The turn pipeline proper, run on a worker thread
///
/// Every stage failure is contained here; the caller emits the terminal
/// ready signal no matter what this returns.
async fn run_turn(
    deps: &TurnDeps,
    session_id: SessionId,
    buffer: Vec<Vec<f32>>,
    sink: &EventSink,
    cancelled: &AtomicBool,
    sessions: &SessionMap,
) -> TurnOutcome {
    sink.status(PipelineStatus::Transcribing);
    let transcript = match deps.transcription.run(buffer, sink).await {
        TranscriptOutcome::Text(text) => text,
        TranscriptOutcome::Empty => return TurnOutcome::NoTranscript,
    };
    if cancelled.load(Ordering::SeqCst) {
        return TurnOutcome::Cancelled;
    }

    sink.transcription(&transcript, true);
    sink.status(PipelineStatus::Processing);

    let interaction_id = match deps
        .store
        .store_interaction(session_id, &transcript, Role::User)
    {
        Ok(id) => {
            sink.debug_event(
                "stored_interaction",
                json!({"id": id, "session_id": session_id, "text": transcript}),
            );
            id
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "failed to store user utterance");
            sink.error("Processing failed");
            sink.debug_event("error", json!({"message": e.to_string()}));
            return TurnOutcome::Failed;
        }
    };

    set_session_state(sessions, session_id, TurnState::ExtractingEntities);
    let entities = deps.extractor.extract(&transcript).await.into_entities();
    sink.debug_event("extracted_entities", json!({"entities": entities}));

    if !entities.is_empty() {
        match deps.store.store_entities(interaction_id, &entities) {
            Ok(count) => sink.debug_event("stored_entities", json!({"count": count})),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to store entities");
                sink.error("Processing failed");
                sink.debug_event("error", json!({"message": e.to_string()}));
                return TurnOutcome::Failed;
            }
        }
    }
    if cancelled.load(Ordering::SeqCst) {
        return TurnOutcome::Cancelled;
    }

    set_session_state(sessions, session_id, TurnState::Thinking);
    sink.status(PipelineStatus::Thinking);
    sink.thinking(ThinkingPhase::Started);
    sink.debug_event("generating_response", json!({"session_id": session_id}));

    let memory_block = deps
        .memory
        .retrieve(&transcript, deps.memory_limit, &deps.memory_prefix)
        .await;
    let reply = deps.responder.reply(session_id, &memory_block).await;
    sink.thinking(ThinkingPhase::Ended);

    if cancelled.load(Ordering::SeqCst) {
        return TurnOutcome::Cancelled;
    }

    set_session_state(sessions, session_id, TurnState::Responding);
    match deps
        .store
        .store_interaction(session_id, &reply, Role::Assistant)
    {
        Ok(id) => sink.debug_event("stored_assistant_response", json!({"id": id, "text": reply})),
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "failed to store assistant reply");
            sink.error("Processing failed");
            sink.debug_event("error", json!({"message": e.to_string()}));
            return TurnOutcome::Failed;
        }
    }
    sink.assistant_response(&reply);

    // Stored only now, so retrieval never sees this utterance as its own past
    deps.memory.store(session_id, interaction_id, &transcript).await;

    TurnOutcome::Completed { reply }
}

/// Builder wiring the external services into an orchestrator
pub struct TurnOrchestratorBuilder {
    config: PipelineConfig,
    transcriber: Option<Arc<dyn Transcriber>>,
    chat: Option<Arc<dyn ChatModel>>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn InteractionStore>>,
    tts: Option<Arc<dyn TtsRenderer>>,
}

impl TurnOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            transcriber: None,
            chat: None,
            embedder: None,
            store: None,
            tts: None,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_chat_model(mut self, chat: Arc<dyn ChatModel>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn InteractionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_tts(mut self, tts: Arc<dyn TtsRenderer>) -> Self {
        self.tts = Some(tts);
        self
    }

    pub fn build(self) -> Result<TurnOrchestrator> {
        self.config
            .validate()
            .map_err(ConfabError::ConfigError)?;

        let transcriber = self
            .transcriber
            .ok_or_else(|| ConfabError::ConfigError("transcriber is required".to_string()))?;
        let chat = self
            .chat
            .ok_or_else(|| ConfabError::ConfigError("chat model is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| ConfabError::ConfigError("embedder is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| ConfabError::ConfigError("interaction store is required".to_string()))?;

        let runtime = Runtime::new()
            .map_err(|e| ConfabError::ConfigError(format!("tokio runtime: {}", e)))?;

        let config = self.config;
        let deps = TurnDeps {
            transcription: TranscriptionStage::new(
                transcriber,
                config.min_buffer_chunks,
                config.min_buffer_samples,
                config.payload_sample_rate,
                config.service_timeout,
            ),
            extractor: EntityExtractor::new(Arc::clone(&chat), config.service_timeout),
            memory: MemoryStore::new(embedder, config.service_timeout),
            responder: ResponseGenerator::new(
                chat,
                Arc::clone(&store),
                config.max_response_tokens,
                config.response_temperature,
                config.service_timeout,
            ),
            store,
            tts: self.tts,
            memory_limit: config.memory_limit,
            memory_prefix: config.memory_prefix.clone(),
        };

        Ok(TurnOrchestrator {
            config,
            deps: Arc::new(deps),
            runtime: Arc::new(runtime),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

impl Default for TurnOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use crate::session::InMemoryInteractionStore;
    use async_trait::async_trait;

    struct StubTranscriber;

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _wav_payload: &[u8]) -> Result<String> {
            Ok("stub".to_string())
        }
    }

    struct StubChat;

    #[async_trait]
    impl ChatModel for StubChat {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _max_tokens: usize,
            _temperature: f32,
        ) -> Result<String> {
            Ok("{}".to_string())
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn orchestrator() -> TurnOrchestrator {
        TurnOrchestrator::builder()
            .with_transcriber(Arc::new(StubTranscriber))
            .with_chat_model(Arc::new(StubChat))
            .with_embedder(Arc::new(StubEmbedder))
            .with_store(Arc::new(InMemoryInteractionStore::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_every_service() {
        let result = TurnOrchestrator::builder()
            .with_chat_model(Arc::new(StubChat))
            .build();
        assert!(matches!(result, Err(ConfabError::ConfigError(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = TurnOrchestrator::builder()
            .with_transcriber(Arc::new(StubTranscriber))
            .with_chat_model(Arc::new(StubChat))
            .with_embedder(Arc::new(StubEmbedder))
            .with_store(Arc::new(InMemoryInteractionStore::new()))
            .with_config(PipelineConfig::default().with_energy_threshold(-1.0))
            .build();
        assert!(matches!(result, Err(ConfabError::ConfigError(_))));
    }

    #[test]
    fn test_open_and_close_session() {
        let orchestrator = orchestrator();
        let (session_id, _rx) = orchestrator.open_session().unwrap();
        assert_eq!(orchestrator.active_sessions(), 1);
        assert_eq!(
            orchestrator.session_state(session_id),
            Some(TurnState::Idle)
        );

        orchestrator.close_session(session_id).unwrap();
        assert_eq!(orchestrator.active_sessions(), 0);
        assert!(matches!(
            orchestrator.close_session(session_id),
            Err(ConfabError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_chunk_for_unknown_session_is_an_error() {
        let orchestrator = orchestrator();
        let result = orchestrator.handle_chunk(uuid::Uuid::new_v4(), &[0.01; 160]);
        assert!(matches!(result, Err(ConfabError::UnknownSession(_))));
    }

    #[test]
    fn test_speech_chunk_emits_listening_status() {
        let orchestrator = orchestrator();
        let (session_id, rx) = orchestrator.open_session().unwrap();

        orchestrator.handle_chunk(session_id, &[0.02; 160]).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            TurnEvent::Status {
                status: PipelineStatus::Listening
            }
        );
        assert_eq!(
            orchestrator.session_state(session_id),
            Some(TurnState::Listening)
        );
    }

    #[test]
    fn test_reset_session_clears_buffer() {
        let orchestrator = orchestrator();
        let (session_id, _rx) = orchestrator.open_session().unwrap();

        orchestrator.handle_chunk(session_id, &[0.02; 160]).unwrap();
        assert_eq!(orchestrator.session_buffer_is_empty(session_id), Some(false));

        orchestrator.reset_session(session_id).unwrap();
        assert_eq!(orchestrator.session_buffer_is_empty(session_id), Some(true));
        assert_eq!(
            orchestrator.session_state(session_id),
            Some(TurnState::Idle)
        );
    }
}
