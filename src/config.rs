//! Configuration for the turn pipeline
//!
//! Provides centralized configuration for voice-activity detection,
//! transcription preconditions, generation bounds, and service timeouts.

use std::time::Duration;

/// Configuration for the complete turn pipeline
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Mean-absolute-amplitude threshold above which a chunk counts as speech
    pub energy_threshold: f32,

    /// How long silence must last after speech before an utterance is complete
    pub silence_threshold: Duration,

    /// Chunks with fewer samples than this are discarded outright
    pub min_chunk_samples: usize,

    /// Minimum number of buffered chunks required to attempt transcription
    pub min_buffer_chunks: usize,

    /// Minimum total sample count required to attempt transcription
    pub min_buffer_samples: usize,

    /// Sample rate of the WAV payload handed to the transcriber
    pub payload_sample_rate: u32,

    /// Maximum tokens for the assistant reply
    pub max_response_tokens: usize,

    /// Sampling temperature for the assistant reply
    pub response_temperature: f32,

    /// How many past utterances memory retrieval may inject into the prompt
    pub memory_limit: usize,

    /// Prefix line for the retrieved-memory block
    pub memory_prefix: String,

    /// Upper bound on each blocking external-service call
    pub service_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.005,
            silence_threshold: Duration::from_secs(1),
            min_chunk_samples: 10,
            min_buffer_chunks: 3,
            min_buffer_samples: 1000,
            payload_sample_rate: 16000,
            max_response_tokens: 200,
            response_temperature: 0.7,
            memory_limit: 3,
            memory_prefix: "Relevant details from earlier in the conversation:".to_string(),
            service_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Set the speech energy threshold
    pub fn with_energy_threshold(mut self, threshold: f32) -> Self {
        self.energy_threshold = threshold;
        self
    }

    /// Set the trailing-silence duration that completes an utterance
    pub fn with_silence_threshold(mut self, threshold: Duration) -> Self {
        self.silence_threshold = threshold;
        self
    }

    /// Set the bound on external service calls
    pub fn with_service_timeout(mut self, timeout: Duration) -> Self {
        self.service_timeout = timeout;
        self
    }

    /// Set the number of retrieved memories injected into the prompt
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.energy_threshold <= 0.0 {
            return Err("energy_threshold must be positive".to_string());
        }
        if self.silence_threshold.is_zero() {
            return Err("silence_threshold must be non-zero".to_string());
        }
        if self.min_buffer_chunks == 0 || self.min_buffer_samples == 0 {
            return Err("transcription preconditions must be non-zero".to_string());
        }
        if self.payload_sample_rate == 0 {
            return Err("payload_sample_rate must be non-zero".to_string());
        }
        if !(0.0..=2.0).contains(&self.response_temperature) {
            return Err(format!(
                "response_temperature out of range: {}",
                self.response_temperature
            ));
        }
        if self.service_timeout.is_zero() {
            return Err("service_timeout must be non-zero".to_string());
        }
        Ok(())
    }
}
