pub mod transcribe;
pub mod tts;

pub use transcribe::{TranscriptOutcome, TranscriptionStage, Transcriber};
pub use tts::TtsRenderer;
