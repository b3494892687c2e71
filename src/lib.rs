pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod stream;
pub mod transcript;

pub use audio::{
    encode_frame, AudioFrame, AudioSource, CaptureBackend, CaptureBackendFactory, CaptureConfig,
    CaptureOrigin, EncodedChunk, FrameChunker, PCM_MIME_TYPE,
};
pub use config::Config;
pub use error::{EchoscribeError, Result};
pub use http::{create_router, AppState};
pub use session::{
    CaptureSessionConfig, LiveCaptureSession, ReconnectPolicy, SessionStats,
};
pub use stream::{SessionEvent, SessionState, StreamConfig, StreamSession};
pub use transcript::{TranscriptAccumulator, TranscriptFragment};
