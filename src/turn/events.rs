//! Lifecycle events consumed by the transport layer
//!
//! Each session owns one event channel; every event for a turn is written
//! either by the dispatch path or by the single active turn worker, so the
//! receiver observes the exact causal sequence.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

/// Wire status values for the `status` lifecycle event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Listening,
    Processing,
    Transcribing,
    Thinking,
    Ready,
}

/// Response-generation bracket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingPhase {
    Started,
    Ended,
}

/// One lifecycle event
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TurnEvent {
    Status {
        status: PipelineStatus,
    },
    Transcription {
        text: String,
        #[serde(rename = "final")]
        is_final: bool,
    },
    Thinking {
        status: ThinkingPhase,
    },
    AssistantResponse {
        text: String,
    },
    Error {
        message: String,
    },
    /// Diagnostic trace, optional for clients
    Debug {
        name: String,
        data: Value,
    },
}

/// Sending half of a session's event stream
///
/// Sends never block the caller; once the receiver is gone (client
/// disconnected) events are silently discarded.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<TurnEvent>,
}

impl EventSink {
    pub fn new() -> (Self, Receiver<TurnEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: TurnEvent) {
        if self.tx.send(event).is_err() {
            trace!("event receiver dropped, discarding event");
        }
    }

    pub fn status(&self, status: PipelineStatus) {
        self.emit(TurnEvent::Status { status });
    }

    pub fn transcription(&self, text: &str, is_final: bool) {
        self.emit(TurnEvent::Transcription {
            text: text.to_string(),
            is_final,
        });
    }

    pub fn thinking(&self, phase: ThinkingPhase) {
        self.emit(TurnEvent::Thinking { status: phase });
    }

    pub fn assistant_response(&self, text: &str) {
        self.emit(TurnEvent::AssistantResponse {
            text: text.to_string(),
        });
    }

    pub fn error(&self, message: &str) {
        self.emit(TurnEvent::Error {
            message: message.to_string(),
        });
    }

    pub fn debug_event(&self, name: &str, data: Value) {
        self.emit(TurnEvent::Debug {
            name: name.to_string(),
            data,
        });
    }
}
