pub mod backend;
pub mod chunker;
pub mod convert;
pub mod encoder;
pub mod media;
pub mod microphone;

pub use backend::{
    AudioFrame, AudioSource, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureOrigin,
};
pub use chunker::FrameChunker;
pub use encoder::{encode_frame, EncodedChunk, PCM_MIME_TYPE};
pub use media::MediaTapBackend;
pub use microphone::MicrophoneBackend;
