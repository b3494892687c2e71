//! HTTP API server for external control (browser UI)
//!
//! This module provides a REST API for controlling live captures:
//! - POST /captures/start - Start a live capture (microphone or media tap)
//! - POST /captures/stop/:id - Stop a capture, returning final stats
//! - GET /captures/:id/status - Query capture status
//! - GET /captures/:id/transcript - Get the live transcript so far
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
