//! In-memory WAV payload encoding for transcription requests

use crate::{ConfabError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use tracing::debug;

/// Encode buffered float samples as a mono 16-bit WAV payload
///
/// This is the fixed audio format handed to the speech-to-text service.
pub fn encode_wav_payload(chunks: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)
        .map_err(|e| ConfabError::AudioProcessingError(format!("WAV writer: {}", e)))?;

    for chunk in chunks {
        for &sample in chunk {
            let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| ConfabError::AudioProcessingError(format!("WAV sample: {}", e)))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| ConfabError::AudioProcessingError(format!("WAV finalize: {}", e)))?;

    let payload = cursor.into_inner();
    debug!(bytes = payload.len(), sample_rate, "encoded WAV payload");
    Ok(payload)
}

/// Decode a mono WAV payload back to float samples
pub fn decode_wav_payload(payload: &[u8]) -> Result<(Vec<f32>, u32)> {
    let reader = WavReader::new(Cursor::new(payload))
        .map_err(|e| ConfabError::AudioProcessingError(format!("WAV reader: {}", e)))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;

    let samples: Result<Vec<f32>> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map_err(|e| ConfabError::AudioProcessingError(format!("WAV sample: {}", e))))
            .collect(),
        SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .into_samples::<i16>()
                .map(|s| {
                    s.map(|sample| sample as f32 / i16::MAX as f32).map_err(|e| {
                        ConfabError::AudioProcessingError(format!("WAV sample: {}", e))
                    })
                })
                .collect(),
            bits => Err(ConfabError::AudioProcessingError(format!(
                "Unsupported bit depth: {}",
                bits
            ))),
        },
    };

    Ok((samples?, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_encode_decode_payload() {
        let sample_rate = 16000;
        let tone: Vec<f32> = (0..1600)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect();
        let chunks = vec![tone[..800].to_vec(), tone[800..].to_vec()];

        let payload = encode_wav_payload(&chunks, sample_rate).unwrap();
        assert!(payload.len() > 44); // header plus data

        let (decoded, rate) = decode_wav_payload(&payload).unwrap();
        assert_eq!(rate, sample_rate);
        assert_eq!(decoded.len(), tone.len());
        for (original, read) in tone.iter().zip(decoded.iter()) {
            assert!((original - read).abs() < 0.001);
        }
    }

    #[test]
    fn test_encode_empty_buffer() {
        let payload = encode_wav_payload(&[], 16000).unwrap();
        let (decoded, _) = decode_wav_payload(&payload).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_clamps_out_of_range_samples() {
        let chunks = vec![vec![2.0, -2.0]];
        let payload = encode_wav_payload(&chunks, 16000).unwrap();
        let (decoded, _) = decode_wav_payload(&payload).unwrap();
        assert!(decoded[0] <= 1.0 && decoded[1] >= -1.0);
    }
}
