//! Text-to-speech collaborator contract
//!
//! Rendering happens only after a turn completes, out of the hot path.
//! Failures are logged and ignored; the reply has already been delivered as
//! text by then.

use crate::Result;

/// External TTS renderer
pub trait TtsRenderer: Send + Sync {
    /// Render the reply to audio bytes
    fn render(&self, text: &str) -> Result<Vec<u8>>;
}
