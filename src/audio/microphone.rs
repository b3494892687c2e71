use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig, CaptureOrigin};
use super::chunker::FrameChunker;
use super::convert;
use crate::error::{EchoscribeError, Result};

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched through the Mutex in MicrophoneBackend,
/// so access is exclusive and never crosses threads concurrently.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Live device input normalized to 16 kHz mono f32 frames.
///
/// Tries the preferred config first (f32, target rate, mono); falls back to
/// the device's native config with software conversion (channel downmix +
/// linear resample) for devices that won't open at the target format.
pub struct MicrophoneBackend {
    device_name: Option<String>,
    config: CaptureConfig,
    stream: Mutex<Option<SendableStream>>,
}

impl MicrophoneBackend {
    pub fn new(device_name: Option<String>, config: CaptureConfig) -> Self {
        Self {
            device_name,
            config,
            stream: Mutex::new(None),
        }
    }

    fn resolve_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(name) = &self.device_name {
            let devices = host
                .input_devices()
                .map_err(|e| EchoscribeError::CaptureUnavailable {
                    reason: format!("failed to enumerate input devices: {}", e),
                })?;

            for device in devices {
                if device.name().map(|n| n == *name).unwrap_or(false) {
                    return Ok(device);
                }
            }

            return Err(EchoscribeError::CaptureUnavailable {
                reason: format!("input device not found: {}", name),
            });
        }

        host.default_input_device()
            .ok_or_else(|| EchoscribeError::CaptureUnavailable {
                reason: "no default input device".to_string(),
            })
    }

    fn build_stream(
        &self,
        device: &cpal::Device,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Result<cpal::Stream> {
        let target_rate = self.config.sample_rate;
        let chunker = Arc::new(Mutex::new(FrameChunker::new(
            self.config.frame_samples,
            target_rate,
            CaptureOrigin::Microphone,
        )));

        let err_callback = |err| {
            warn!("Microphone stream error: {}", err);
        };

        // Preferred: f32 mono at the target rate, no conversion needed.
        // PipeWire/PulseAudio convert transparently on most setups.
        let preferred = cpal::StreamConfig {
            channels: 1,
            sample_rate: target_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        {
            let chunker = Arc::clone(&chunker);
            let tx = tx.clone();
            if let Ok(stream) = device.build_input_stream(
                &preferred,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    deliver(&chunker, &tx, data);
                },
                err_callback,
                None,
            ) {
                return Ok(stream);
            }
        }

        // Fallback: capture at the device's native config and convert in
        // software. The capture callback must never block, so conversion
        // happens inline and frames go out through try_send.
        let native = device
            .default_input_config()
            .map_err(|e| EchoscribeError::CaptureUnavailable {
                reason: format!("failed to query input config: {}", e),
            })?;

        let native_rate = native.sample_rate();
        let native_channels = native.channels() as usize;
        let stream_config: cpal::StreamConfig = native.clone().into();

        info!(
            "Microphone opened at native format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            native.sample_format()
        );

        match native.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mono = convert::downmix_to_mono(data, native_channels);
                        let resampled = convert::resample_linear(&mono, native_rate, target_rate);
                        deliver(&chunker, &tx, &resampled);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| EchoscribeError::CaptureUnavailable {
                    reason: format!("failed to build native f32 stream: {}", e),
                }),
            cpal::SampleFormat::I16 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let float: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32768.0).collect();
                        let mono = convert::downmix_to_mono(&float, native_channels);
                        let resampled = convert::resample_linear(&mono, native_rate, target_rate);
                        deliver(&chunker, &tx, &resampled);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| EchoscribeError::CaptureUnavailable {
                    reason: format!("failed to build native i16 stream: {}", e),
                }),
            fmt => Err(EchoscribeError::CaptureUnavailable {
                reason: format!("unsupported native sample format: {:?}", fmt),
            }),
        }
    }
}

/// Push a block through the chunker and hand complete frames to the channel.
///
/// try_send keeps the audio callback real-time safe; if the forwarder has
/// fallen behind and the channel is full, the frame is dropped.
fn deliver(chunker: &Arc<Mutex<FrameChunker>>, tx: &mpsc::Sender<AudioFrame>, samples: &[f32]) {
    let frames = match chunker.lock() {
        Ok(mut ch) => ch.push(samples),
        Err(_) => return,
    };
    for frame in frames {
        if tx.try_send(frame).is_err() {
            warn!("Frame channel full, dropping microphone frame");
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            return Err(EchoscribeError::CaptureUnavailable {
                reason: "microphone capture already running".to_string(),
            });
        }

        let device = self.resolve_device()?;
        info!(
            "Starting microphone capture on {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        let (tx, rx) = mpsc::channel(self.config.queue_depth);
        let stream = self.build_stream(&device, tx)?;

        stream
            .play()
            .map_err(|e| EchoscribeError::CaptureUnavailable {
                reason: format!("failed to start audio stream: {}", e),
            })?;

        match self.stream.lock() {
            Ok(mut guard) => *guard = Some(SendableStream(stream)),
            Err(_) => {
                return Err(EchoscribeError::CaptureUnavailable {
                    reason: "stream lock poisoned".to_string(),
                });
            }
        }

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        let stream = self.stream.lock().ok().and_then(|mut g| g.take());
        if let Some(stream) = stream {
            if let Err(e) = stream.0.pause() {
                warn!("Failed to pause microphone stream: {}", e);
            }
            // Dropping the stream releases the device.
            info!("Microphone capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.stream.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_device_is_capture_unavailable() {
        let backend = MicrophoneBackend::new(
            Some("NonExistentDevice12345".to_string()),
            CaptureConfig::default(),
        );

        match backend.resolve_device() {
            Err(EchoscribeError::CaptureUnavailable { reason }) => {
                assert!(reason.contains("NonExistentDevice12345") || reason.contains("enumerate"));
            }
            Ok(_) => panic!("expected CaptureUnavailable"),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    #[tokio::test]
    #[ignore] // Requires audio hardware
    async fn test_start_stop_default_device() {
        let mut backend = MicrophoneBackend::new(None, CaptureConfig::default());
        let _rx = backend.start().await.expect("failed to start capture");
        assert!(backend.is_capturing());

        backend.stop().await.expect("failed to stop capture");
        assert!(!backend.is_capturing());
    }
}
