//! Live capture session management
//!
//! This module provides the `LiveCaptureSession` abstraction that manages:
//! - Audio acquisition from a microphone or media tap
//! - Frame encoding and forwarding to the streaming session
//! - Transcript fragment collection and accumulation
//! - Reconnect policy and session statistics

mod capture;
mod config;
mod stats;

pub use capture::{ErrorCallback, FragmentCallback, LiveCaptureSession};
pub use config::{CaptureSessionConfig, ReconnectPolicy};
pub use stats::SessionStats;
