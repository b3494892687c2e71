use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::audio::CaptureConfig;
use crate::error::EchoscribeError;
use crate::session::ReconnectPolicy;
use crate::stream::StreamConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub stream: StreamSettings,
    pub audio: AudioSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct StreamSettings {
    /// WebSocket endpoint of the transcription service
    pub endpoint: String,

    /// Environment variable holding the API key; keys never live in the file
    pub api_key_env: Option<String>,

    pub connect_timeout_secs: u64,
    pub send_queue_depth: usize,
    pub reconnect: ReconnectSettings,
}

#[derive(Debug, Deserialize)]
pub struct ReconnectSettings {
    /// 0 disables reconnection (fail fast on transport errors)
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub frame_samples: usize,
}

impl Config {
    /// Load from a config file, with `ECHOSCRIBE_*` environment overrides
    /// layered on top (e.g. `ECHOSCRIBE_SERVICE__HTTP__PORT=9000`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("ECHOSCRIBE").separator("__"))
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> std::result::Result<(), EchoscribeError> {
        if self.audio.sample_rate == 0 {
            return Err(EchoscribeError::InvalidConfig {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.frame_samples == 0 {
            return Err(EchoscribeError::InvalidConfig {
                key: "audio.frame_samples".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.stream.endpoint.is_empty() {
            return Err(EchoscribeError::InvalidConfig {
                key: "stream.endpoint".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.audio.sample_rate,
            frame_samples: self.audio.frame_samples,
            ..CaptureConfig::default()
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        let api_key = self
            .stream
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok());

        StreamConfig {
            endpoint: self.stream.endpoint.clone(),
            api_key,
            connect_timeout: Duration::from_secs(self.stream.connect_timeout_secs),
            send_queue_depth: self.stream.send_queue_depth,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        if self.stream.reconnect.max_attempts == 0 {
            ReconnectPolicy::FailFast
        } else {
            ReconnectPolicy::Retry {
                max_attempts: self.stream.reconnect.max_attempts,
                initial_backoff: Duration::from_millis(self.stream.reconnect.initial_backoff_ms),
            }
        }
    }
}
