use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a live capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Whether the capture is currently live
    pub is_live: bool,

    /// When the capture started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Audio frames encoded and handed to the streaming session
    pub frames_sent: usize,

    /// Transcript fragments received from the remote endpoint
    pub fragments_received: usize,
}
