use thiserror::Error;

/// Error taxonomy for the live capture pipeline.
///
/// Capture-start failures (`CaptureUnavailable`, `ConnectionFailure`) are
/// surfaced synchronously to the caller. `Transport` covers mid-stream
/// failures: non-fatal to the process, terminal to the capture unless the
/// reconnect policy recovers the session.
#[derive(Error, Debug)]
pub enum EchoscribeError {
    #[error("audio source unavailable: {reason}")]
    CaptureUnavailable { reason: String },

    #[error("failed to establish streaming session: {reason}")]
    ConnectionFailure { reason: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, EchoscribeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_unavailable_display() {
        let err = EchoscribeError::CaptureUnavailable {
            reason: "no input device".to_string(),
        };
        assert_eq!(err.to_string(), "audio source unavailable: no input device");
    }

    #[test]
    fn test_connection_failure_display() {
        let err = EchoscribeError::ConnectionFailure {
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to establish streaming session: connection refused"
        );
    }
}
