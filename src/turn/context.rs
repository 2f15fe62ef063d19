//! Per-session turn state
//!
//! A `TurnContext` owns the session's audio buffer and pipeline stage.
//! Exactly one exists per session and it is never shared across sessions.

use crate::audio::{AudioIngestor, VadSignal};
use crate::session::SessionId;
use tracing::debug;

/// Pipeline stage of the current turn
///
/// `Idle` is both the initial and the terminal state of every turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Listening,
    ReadyToProcess,
    Transcribing,
    ExtractingEntities,
    Thinking,
    Responding,
}

impl TurnState {
    /// A turn is in flight from transcription through response delivery
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TurnState::Transcribing
                | TurnState::ExtractingEntities
                | TurnState::Thinking
                | TurnState::Responding
        )
    }
}

/// Maximum retained diagnostic notes per session
const MAX_DIAGNOSTICS: usize = 64;

/// Transient per-session pipeline state
pub struct TurnContext {
    session_id: SessionId,
    state: TurnState,
    ingestor: AudioIngestor,
    diagnostics: Vec<String>,
}

impl TurnContext {
    pub fn new(session_id: SessionId, ingestor: AudioIngestor) -> Self {
        Self {
            session_id,
            state: TurnState::Idle,
            ingestor,
            diagnostics: Vec::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn set_state(&mut self, state: TurnState) {
        if state != self.state {
            debug!(session_id = %self.session_id, from = ?self.state, to = ?state, "turn state change");
            self.state = state;
        }
    }

    /// Feed an audio chunk into the session's VAD buffer
    pub fn add_chunk(&mut self, samples: &[f32]) -> Option<VadSignal> {
        let signal = self.ingestor.add_chunk(samples);
        match signal {
            Some(VadSignal::Listening) => self.set_state(TurnState::Listening),
            Some(VadSignal::Processing) => self.set_state(TurnState::ReadyToProcess),
            None => {}
        }
        signal
    }

    /// Drain the audio buffer for transcription; the buffer is always left empty
    pub fn take_buffer(&mut self) -> Vec<Vec<f32>> {
        self.ingestor.take_buffer()
    }

    pub fn buffer_is_empty(&self) -> bool {
        self.ingestor.is_empty()
    }

    /// Record a diagnostic note, keeping only the most recent entries
    pub fn note(&mut self, message: impl Into<String>) {
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.remove(0);
        }
        self.diagnostics.push(message.into());
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Return to `Idle` at the end of a turn or on explicit reset
    pub fn finish_turn(&mut self) {
        self.set_state(TurnState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn context() -> TurnContext {
        let ingestor = AudioIngestor::new(0.005, Duration::from_millis(50), 10);
        TurnContext::new(Uuid::new_v4(), ingestor)
    }

    #[test]
    fn test_initial_state_is_idle() {
        let ctx = context();
        assert_eq!(ctx.state(), TurnState::Idle);
        assert!(!ctx.state().is_in_flight());
        assert!(ctx.buffer_is_empty());
    }

    #[test]
    fn test_speech_moves_to_listening() {
        let mut ctx = context();
        let signal = ctx.add_chunk(&vec![0.02; 160]);
        assert_eq!(signal, Some(VadSignal::Listening));
        assert_eq!(ctx.state(), TurnState::Listening);
    }

    #[test]
    fn test_in_flight_states() {
        for state in [
            TurnState::Transcribing,
            TurnState::ExtractingEntities,
            TurnState::Thinking,
            TurnState::Responding,
        ] {
            assert!(state.is_in_flight());
        }
        for state in [TurnState::Idle, TurnState::Listening, TurnState::ReadyToProcess] {
            assert!(!state.is_in_flight());
        }
    }

    #[test]
    fn test_finish_turn_returns_to_idle() {
        let mut ctx = context();
        ctx.set_state(TurnState::Responding);
        ctx.finish_turn();
        assert_eq!(ctx.state(), TurnState::Idle);
    }

    #[test]
    fn test_diagnostics_are_bounded() {
        let mut ctx = context();
        for i in 0..100 {
            ctx.note(format!("note {}", i));
        }
        assert_eq!(ctx.diagnostics().len(), MAX_DIAGNOSTICS);
        assert_eq!(ctx.diagnostics().last().unwrap(), "note 99");
    }
}
