use base64::Engine;

use super::backend::AudioFrame;

/// MIME descriptor the streaming endpoint expects for raw PCM frames.
pub const PCM_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// An audio frame serialized for the wire: 16-bit little-endian PCM,
/// base64-encoded, tagged with its format descriptor. Immutable once produced.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub data: String,
    pub mime_type: String,
}

/// Convert one float sample to fixed-point.
///
/// Out-of-range input (beyond ±1.0) is clamped rather than left to wrap.
fn sample_to_i16(sample: f32) -> i16 {
    let scaled = (sample as f64 * 32768.0).round();
    scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Encode a captured frame into the wire format.
///
/// Pure transformation: i16 conversion, little-endian packing, base64.
/// The frame length invariant is the chunker's responsibility; a violation
/// here is a programming bug, not a runtime condition.
pub fn encode_frame(frame: &AudioFrame, expected_samples: usize) -> EncodedChunk {
    debug_assert!(
        frame.samples.len() <= expected_samples,
        "frame exceeds configured length: {} > {}",
        frame.samples.len(),
        expected_samples
    );

    let pcm_bytes: Vec<u8> = frame
        .samples
        .iter()
        .flat_map(|&s| sample_to_i16(s).to_le_bytes())
        .collect();

    EncodedChunk {
        data: base64::engine::general_purpose::STANDARD.encode(&pcm_bytes),
        mime_type: PCM_MIME_TYPE.to_string(),
    }
}
