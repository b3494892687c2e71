use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::stream::StreamConfig;

/// What to do when the streaming session fails after reaching Open.
///
/// Mid-stream transport failures are never retried silently forever: either
/// the capture fails fast, or a bounded number of reconnects is attempted
/// with linearly growing backoff before the capture is terminated and the
/// caller notified.
#[derive(Debug, Clone)]
pub enum ReconnectPolicy {
    /// Any transport error ends the capture immediately.
    FailFast,
    /// Attempt up to `max_attempts` reconnects, waiting
    /// `initial_backoff * attempt` before each one.
    Retry {
        max_attempts: u32,
        initial_backoff: Duration,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Retry {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Configuration for a live capture session.
#[derive(Debug, Clone)]
pub struct CaptureSessionConfig {
    /// Unique capture identifier (e.g., "capture-7f3a...")
    pub capture_id: String,

    /// Frame shape and capture rate
    pub audio: CaptureConfig,

    /// Streaming endpoint parameters
    pub stream: StreamConfig,

    /// Mid-stream failure handling
    pub reconnect: ReconnectPolicy,
}

impl Default for CaptureSessionConfig {
    fn default() -> Self {
        Self {
            capture_id: format!("capture-{}", uuid::Uuid::new_v4()),
            audio: CaptureConfig::default(),
            stream: StreamConfig::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
