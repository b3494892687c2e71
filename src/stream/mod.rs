//! Streaming session client for the remote transcription endpoint.
//!
//! One persistent bidirectional connection per capture: encoded audio frames
//! go out as realtime input messages, transcript fragments come back as
//! session events.

pub mod client;
pub mod messages;

pub use client::{SessionEvent, SessionState, StreamConfig, StreamSession};
pub use messages::{RealtimeInput, ServerMessage, SetupMessage};
