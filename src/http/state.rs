use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::session::LiveCaptureSession;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Service configuration (stream endpoint, audio shape)
    pub config: Arc<Config>,

    /// Active capture sessions (capture_id → session)
    pub captures: Arc<RwLock<HashMap<String, Arc<LiveCaptureSession>>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            captures: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}
