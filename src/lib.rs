pub mod audio;
pub mod config;
pub mod entities;
pub mod llm;
pub mod memory;
pub mod session;
pub mod speech;
pub mod turn;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ConfabError {
    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Transcription error: {0}")]
    TranscriptionError(String),

    #[error("Entity extraction error: {0}")]
    ExtractionError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("Interaction store error: {0}")]
    StoreError(String),

    #[error("TTS error: {0}")]
    TtsError(String),

    #[error("Unknown session: {0}")]
    UnknownSession(uuid::Uuid),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Service call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ConfabError {
    /// Check if this error is recoverable within the current turn
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Transient service errors degrade the turn but never end it
            ConfabError::TranscriptionError(_) => true,
            ConfabError::ExtractionError(_) => true,
            ConfabError::EmbeddingError(_) => true,
            ConfabError::GenerationError(_) => true,
            ConfabError::TtsError(_) => true,
            ConfabError::Timeout(_) => true,
            ConfabError::AudioProcessingError(_) => true,
            // These indicate broken host wiring
            ConfabError::StoreError(_) => false,
            ConfabError::UnknownSession(_) => false,
            ConfabError::ConfigError(_) => false,
            ConfabError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ConfabError::AudioProcessingError(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
            ConfabError::TranscriptionError(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            ConfabError::ExtractionError(_) => {
                "Could not analyze the request in full. Continuing anyway.".to_string()
            }
            ConfabError::EmbeddingError(_) => {
                "Conversation memory is temporarily unavailable.".to_string()
            }
            ConfabError::GenerationError(_) => {
                "Response generation failed. Please try again.".to_string()
            }
            ConfabError::StoreError(_) => {
                "Could not save the conversation. Please check storage.".to_string()
            }
            ConfabError::TtsError(_) => {
                "Text-to-speech failed. Response will be shown as text.".to_string()
            }
            ConfabError::UnknownSession(_) => {
                "Session not found. Please reconnect.".to_string()
            }
            ConfabError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            ConfabError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            ConfabError::Timeout(_) => {
                "The request took too long. Please try again.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfabError>;
