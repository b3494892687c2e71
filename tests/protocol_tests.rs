use base64::Engine;
use echoscribe::audio::backend::{AudioFrame, CaptureOrigin};
use echoscribe::audio::encode_frame;
use echoscribe::stream::{RealtimeInput, ServerMessage, SetupMessage};

fn frame(samples: Vec<f32>) -> AudioFrame {
    AudioFrame {
        samples,
        sample_rate: 16000,
        timestamp_ms: 0,
        origin: CaptureOrigin::Microphone,
    }
}

#[test]
fn test_setup_message_shape() {
    let json = serde_json::to_string(&SetupMessage::new()).unwrap();

    assert!(json.contains("\"setup\""));
    assert!(json.contains("\"responseModalities\":[\"AUDIO\"]"));
    assert!(json.contains("\"inputAudioTranscription\":{}"));
}

#[test]
fn test_realtime_input_shape() {
    let chunk = encode_frame(&frame(vec![0.0, 0.25, -0.25]), 3);
    let msg = RealtimeInput::from(chunk);
    let json = serde_json::to_string(&msg).unwrap();

    assert!(json.contains("\"media\""));
    assert!(json.contains("\"data\""));
    assert!(json.contains("\"mimeType\":\"audio/pcm;rate=16000\""));
}

#[test]
fn test_server_message_with_transcription() {
    let json = r#"{
        "serverContent": {
            "inputTranscription": { "text": "Hello world" }
        }
    }"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.transcription_text(), Some("Hello world"));
}

#[test]
fn test_server_message_without_transcription() {
    // Audio responses and turn bookkeeping carry serverContent without an
    // inputTranscription; they must parse and yield no fragment.
    let json = r#"{
        "serverContent": {
            "modelTurn": { "parts": [] },
            "turnComplete": true
        }
    }"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.transcription_text(), None);
}

#[test]
fn test_server_message_unrelated() {
    let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
    assert_eq!(msg.transcription_text(), None);
}

#[test]
fn test_pcm_encoding_roundtrip() {
    let original: Vec<f32> = vec![100.0 / 32768.0, -200.0 / 32768.0, 300.0 / 32768.0];
    let chunk = encode_frame(&frame(original), 3);

    // Ship it through the wire message and back
    let json = serde_json::to_string(&RealtimeInput::from(chunk)).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let data = parsed["media"]["data"].as_str().unwrap();

    let decoded_bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .unwrap();
    let decoded_samples: Vec<i16> = decoded_bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    assert_eq!(decoded_samples, vec![100, -200, 300]);
}
