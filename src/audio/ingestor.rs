//! Voice-activity detection and per-session audio buffering
//!
//! Energy-threshold VAD: a chunk whose mean absolute amplitude exceeds the
//! threshold is speech; once speech has been heard, a stretch of silence
//! longer than the silence threshold completes the utterance.

use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// VAD buffering states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VadState {
    /// No speech heard yet
    Idle,
    /// Speech in progress
    Listening,
    /// Trailing silence elapsed; the buffered utterance is complete
    ReadyToProcess,
}

/// Signal produced by feeding a chunk into the ingestor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VadSignal {
    /// Speech detected in this chunk
    Listening,
    /// Silence threshold elapsed after speech; process the buffer now
    Processing,
}

/// Per-session audio buffer with voice-activity detection
///
/// Exclusively owned by one session. Chunks accumulate until the silence
/// threshold elapses after speech, at which point the caller drains the
/// buffer with [`AudioIngestor::take_buffer`].
pub struct AudioIngestor {
    chunks: Vec<Vec<f32>>,
    total_samples: usize,
    state: VadState,
    is_speaking: bool,
    last_speech_time: Option<Instant>,
    energy_threshold: f32,
    silence_threshold: Duration,
    min_chunk_samples: usize,
}

impl AudioIngestor {
    pub fn new(
        energy_threshold: f32,
        silence_threshold: Duration,
        min_chunk_samples: usize,
    ) -> Self {
        Self {
            chunks: Vec::new(),
            total_samples: 0,
            state: VadState::Idle,
            is_speaking: false,
            last_speech_time: None,
            energy_threshold,
            silence_threshold,
            min_chunk_samples,
        }
    }

    /// Feed a chunk of float samples into the buffer
    ///
    /// Non-blocking and cheap; safe to call on the connection-dispatch path.
    pub fn add_chunk(&mut self, samples: &[f32]) -> Option<VadSignal> {
        self.add_chunk_at(samples, Instant::now())
    }

    /// Feed a chunk with an explicit timestamp (injectable clock for tests)
    pub fn add_chunk_at(&mut self, samples: &[f32], now: Instant) -> Option<VadSignal> {
        // Malformed chunk: dropped with no state change and no buffer mutation
        if samples.len() < self.min_chunk_samples {
            trace!(len = samples.len(), "dropping undersized audio chunk");
            return None;
        }

        let energy = chunk_energy(samples);

        if energy > self.energy_threshold {
            self.push(samples);
            self.is_speaking = true;
            self.last_speech_time = Some(now);
            self.state = VadState::Listening;
            return Some(VadSignal::Listening);
        }

        if self.is_speaking {
            if let Some(last) = self.last_speech_time {
                if now.duration_since(last) > self.silence_threshold {
                    self.is_speaking = false;
                    self.state = VadState::ReadyToProcess;
                    debug!(
                        chunks = self.chunks.len(),
                        samples = self.total_samples,
                        "silence threshold elapsed, utterance complete"
                    );
                    return Some(VadSignal::Processing);
                }
            }
        }

        // Silence within tolerance, or pre-speech silence: still audio content
        self.push(samples);
        None
    }

    /// Drain the buffered chunks and reset the machine to `Idle`
    ///
    /// Called on every transcription attempt; the buffer is always left empty.
    pub fn take_buffer(&mut self) -> Vec<Vec<f32>> {
        self.total_samples = 0;
        self.is_speaking = false;
        self.last_speech_time = None;
        self.state = VadState::Idle;
        std::mem::take(&mut self.chunks)
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn is_speaking(&self) -> bool {
        self.is_speaking
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn sample_count(&self) -> usize {
        self.total_samples
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn push(&mut self, samples: &[f32]) {
        self.total_samples += samples.len();
        self.chunks.push(samples.to_vec());
    }
}

/// Mean absolute amplitude of a chunk
fn chunk_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}
