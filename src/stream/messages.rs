use serde::{Deserialize, Serialize};

use crate::audio::EncodedChunk;

/// Session configuration sent once after the transport opens: requests audio
/// response modality and transcription of the audio we send.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetupMessage {
    pub setup: SetupConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupConfig {
    pub response_modalities: Vec<String>,
    pub input_audio_transcription: InputTranscriptionConfig,
}

/// Empty marker object; present means "transcribe the input audio".
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InputTranscriptionConfig {}

impl SetupMessage {
    pub fn new() -> Self {
        Self {
            setup: SetupConfig {
                response_modalities: vec!["AUDIO".to_string()],
                input_audio_transcription: InputTranscriptionConfig {},
            },
        }
    }
}

impl Default for SetupMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound realtime message: one encoded audio frame.
#[derive(Debug, Serialize, Deserialize)]
pub struct RealtimeInput {
    pub media: MediaPayload,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    /// Base64-encoded PCM bytes
    pub data: String,
    pub mime_type: String,
}

impl From<EncodedChunk> for RealtimeInput {
    fn from(chunk: EncodedChunk) -> Self {
        Self {
            media: MediaPayload {
                data: chunk.data,
                mime_type: chunk.mime_type,
            },
        }
    }
}

/// Inbound message from the streaming endpoint.
///
/// Only the input-transcription path matters to this client; everything else
/// (audio responses, turn bookkeeping) deserializes to `None` and is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub input_transcription: Option<InputTranscription>,
}

#[derive(Debug, Deserialize)]
pub struct InputTranscription {
    pub text: String,
}

impl ServerMessage {
    /// Extract the transcript fragment text, if this message carries one.
    pub fn transcription_text(&self) -> Option<&str> {
        self.server_content
            .as_ref()
            .and_then(|c| c.input_transcription.as_ref())
            .map(|t| t.text.as_str())
    }
}
