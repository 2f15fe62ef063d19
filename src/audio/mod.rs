pub mod ingestor;
pub mod wav;

pub use ingestor::{AudioIngestor, VadSignal, VadState};
pub use wav::{decode_wav_payload, encode_wav_payload};
