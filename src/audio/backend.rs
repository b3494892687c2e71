use crate::error::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Where a capture's audio comes from.
///
/// Tagged for the HTTP API, e.g. `{"type": "microphone"}` or
/// `{"type": "media_tap", "path": "talk.mp4"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioSource {
    /// Live device input.
    Microphone {
        #[serde(default)]
        device: Option<String>,
    },
    /// Audio track of already-loaded media (video or audio file).
    MediaTap { path: String },
}

impl AudioSource {
    pub fn origin(&self) -> CaptureOrigin {
        match self {
            AudioSource::Microphone { .. } => CaptureOrigin::Microphone,
            AudioSource::MediaTap { .. } => CaptureOrigin::MediaTap,
        }
    }
}

/// Origin tag carried on every frame, mostly for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOrigin {
    Microphone,
    MediaTap,
}

/// A fixed-size block of mono audio samples at the capture sample rate.
///
/// Samples are f32 in the nominal range -1.0..1.0; length is constant per
/// capture configuration (`CaptureConfig::frame_samples`).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
    pub origin: CaptureOrigin,
}

/// Configuration shared by all capture backends.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture sample rate (the streaming endpoint expects 16 kHz)
    pub sample_rate: u32,
    /// Samples per emitted frame
    pub frame_samples: usize,
    /// Bound on the frame channel between backend and forwarder
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_samples: 4096,
            queue_depth: 32,
        }
    }
}

/// Capture backend trait: one implementation per audio origin.
///
/// Both origins yield the same frame shape downstream; the backend's job is
/// solely to normalize acquisition differences (device stream vs. media
/// decode) into one frame-per-message contract.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start producing frames.
    ///
    /// Returns a channel receiver that will receive fixed-size audio frames.
    /// Acquisition failure surfaces `CaptureUnavailable` and no frames are
    /// produced.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop producing frames and release the device/tap.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    /// Create the backend matching the requested audio source.
    pub fn create(source: &AudioSource, config: CaptureConfig) -> Box<dyn CaptureBackend> {
        match source {
            AudioSource::Microphone { device } => Box::new(
                super::microphone::MicrophoneBackend::new(device.clone(), config),
            ),
            AudioSource::MediaTap { path } => {
                Box::new(super::media::MediaTapBackend::new(path.clone(), config))
            }
        }
    }
}
