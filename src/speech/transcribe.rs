//! Transcription stage: buffered audio in, utterance text out

use crate::audio::encode_wav_payload;
use crate::turn::events::EventSink;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// External speech-to-text service
///
/// `transcribe` receives a complete WAV payload and blocks for potentially
/// multiple seconds; the orchestrator runs it on a turn worker, never on the
/// connection-dispatch path.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav_payload: &[u8]) -> Result<String>;
}

/// Outcome of one transcription attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// Non-empty trimmed transcript
    Text(String),
    /// Buffer too small, service failure, or empty transcript
    Empty,
}

impl TranscriptOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, TranscriptOutcome::Empty)
    }
}

/// Converts a completed utterance buffer into text
pub struct TranscriptionStage {
    transcriber: Arc<dyn Transcriber>,
    min_chunks: usize,
    min_samples: usize,
    sample_rate: u32,
    timeout: Duration,
}

impl TranscriptionStage {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        min_chunks: usize,
        min_samples: usize,
        sample_rate: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            transcriber,
            min_chunks,
            min_samples,
            sample_rate,
            timeout,
        }
    }

    /// Transcribe a drained utterance buffer
    ///
    /// Consumes the buffer by value, so it is cleared on every path: success,
    /// empty result, or failure. A preliminary (`final: false`) transcription
    /// event is emitted as soon as text is available, independent of
    /// downstream processing. Service failures surface as
    /// [`TranscriptOutcome::Empty`], never as errors.
    pub async fn run(&self, buffer: Vec<Vec<f32>>, events: &EventSink) -> TranscriptOutcome {
        let total_samples: usize = buffer.iter().map(Vec::len).sum();
        if buffer.len() < self.min_chunks || total_samples < self.min_samples {
            debug!(
                chunks = buffer.len(),
                samples = total_samples,
                "audio buffer too small, skipping transcription"
            );
            return TranscriptOutcome::Empty;
        }

        let payload = match encode_wav_payload(&buffer, self.sample_rate) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to encode transcription payload");
                return TranscriptOutcome::Empty;
            }
        };

        let result =
            tokio::time::timeout(self.timeout, self.transcriber.transcribe(&payload)).await;

        let raw = match result {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(error = %e, "transcription failed");
                return TranscriptOutcome::Empty;
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "transcription timed out");
                return TranscriptOutcome::Empty;
            }
        };

        let transcript = raw.trim();
        if transcript.is_empty() {
            debug!("transcriber returned empty text");
            return TranscriptOutcome::Empty;
        }

        // Preliminary transcript goes out immediately, before any downstream work
        events.transcription(transcript, false);
        debug!(text = transcript, "transcription complete");
        TranscriptOutcome::Text(transcript.to_string())
    }
}
