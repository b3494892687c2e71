use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig, CaptureOrigin};
use super::chunker::FrameChunker;
use super::convert;
use crate::error::{EchoscribeError, Result};

/// Taps the audio track of already-loaded media (video or audio file).
///
/// The container is demuxed with symphonia, only the audio track is decoded,
/// and the result is normalized to 16 kHz mono. Frames are then emitted at
/// playback pace, one per frame duration, so downstream sees the same cadence
/// a live source produces.
pub struct MediaTapBackend {
    path: PathBuf,
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MediaTapBackend {
    pub fn new(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MediaTapBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            return Err(EchoscribeError::CaptureUnavailable {
                reason: "media tap already running".to_string(),
            });
        }

        let path = self.path.clone();
        let target_rate = self.config.sample_rate;

        // Decode is CPU-bound; keep it off the async workers. A failure here
        // means the tap cannot be provided and no frames are produced.
        let samples = tokio::task::spawn_blocking(move || decode_audio_track(&path, target_rate))
            .await
            .map_err(|e| EchoscribeError::CaptureUnavailable {
                reason: format!("decode task failed: {}", e),
            })??;

        info!(
            "Media tap ready: {} ({:.1}s of audio at {}Hz)",
            self.path.display(),
            samples.len() as f64 / target_rate as f64,
            target_rate
        );

        let mut chunker = FrameChunker::new(
            self.config.frame_samples,
            target_rate,
            CaptureOrigin::MediaTap,
        );
        let mut frames = chunker.push(&samples);
        if let Some(tail) = chunker.flush() {
            frames.push(tail);
        }

        let frame_duration = Duration::from_millis(
            self.config.frame_samples as u64 * 1000 / target_rate as u64,
        );

        let (tx, rx) = mpsc::channel(self.config.queue_depth);
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_duration);

            for frame in frames {
                ticker.tick().await;

                if !running.load(Ordering::SeqCst) {
                    debug!("Media tap stopped before playback finished");
                    break;
                }
                if tx.send(frame).await.is_err() {
                    debug!("Frame receiver dropped, ending media tap");
                    break;
                }
            }

            running.store(false, Ordering::SeqCst);
            debug!("Media tap playback finished");
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Media tap task panicked: {}", e);
            }
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "media_tap"
    }
}

/// Decode the first audio track of a media file to mono f32 at `target_rate`.
fn decode_audio_track(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    let file = std::fs::File::open(path).map_err(|e| EchoscribeError::CaptureUnavailable {
        reason: format!("cannot open {}: {}", path.display(), e),
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| EchoscribeError::CaptureUnavailable {
            reason: format!("unsupported media container: {}", e),
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| EchoscribeError::CaptureUnavailable {
            reason: format!("no audio track in {}", path.display()),
        })?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| EchoscribeError::CaptureUnavailable {
            reason: format!("no decoder for audio track: {}", e),
        })?;

    let mut samples: Vec<f32> = Vec::new();
    let mut source_rate = 0u32;
    let mut channels = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(EchoscribeError::CaptureUnavailable {
                    reason: format!("demux error: {}", e),
                });
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                source_rate = spec.rate;
                channels = spec.channels.count();

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Recoverable per-packet decode errors: skip the packet
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
            }
            Err(e) => {
                return Err(EchoscribeError::CaptureUnavailable {
                    reason: format!("decode error: {}", e),
                });
            }
        }
    }

    if samples.is_empty() {
        return Err(EchoscribeError::CaptureUnavailable {
            reason: format!("audio track in {} decoded to no samples", path.display()),
        });
    }

    let mono = convert::downmix_to_mono(&samples, channels.max(1));
    Ok(convert::resample_linear(&mono, source_rate, target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_capture_unavailable() {
        let mut backend = MediaTapBackend::new("/nonexistent/clip.mp4", CaptureConfig::default());

        match backend.start().await {
            Err(EchoscribeError::CaptureUnavailable { reason }) => {
                assert!(reason.contains("/nonexistent/clip.mp4"));
            }
            Ok(_) => panic!("expected CaptureUnavailable"),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}
