use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::{CaptureSessionConfig, ReconnectPolicy};
use super::stats::SessionStats;
use crate::audio::{
    encode_frame, AudioFrame, AudioSource, CaptureBackend, CaptureBackendFactory,
};
use crate::error::{EchoscribeError, Result};
use crate::stream::{SessionEvent, StreamConfig, StreamSession};
use crate::transcript::TranscriptAccumulator;

/// Invoked once per transcript fragment with exactly the fragment's text.
pub type FragmentCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Invoked when the capture terminates abnormally (transport failure the
/// reconnect policy could not recover).
pub type ErrorCallback = Box<dyn Fn(&EchoscribeError) + Send + Sync>;

/// A live capture session: owns the audio backend, the streaming session,
/// and the transcript accumulator for one capture.
///
/// Lifecycle is explicit start/stop; every resource acquired by `start` is
/// released by `stop` (or was never acquired, on a failed start). The
/// session connects before the audio source is acquired, so a rejected
/// connect never opens a device, and no audio is captured before the
/// endpoint can accept it.
pub struct LiveCaptureSession {
    config: CaptureSessionConfig,

    /// When the capture started
    started_at: chrono::DateTime<chrono::Utc>,

    /// Whether the capture is currently live
    is_live: Arc<AtomicBool>,

    /// Frames encoded and handed to the session
    frames_sent: Arc<AtomicUsize>,

    /// Fragments applied to the accumulator
    fragments_received: Arc<AtomicUsize>,

    /// The live transcript for this capture
    accumulator: Arc<Mutex<TranscriptAccumulator>>,

    /// Active streaming session; replaced in place on reconnect
    stream: Arc<Mutex<Option<Arc<StreamSession>>>>,

    /// Active capture backend
    backend: Mutex<Option<Box<dyn CaptureBackend>>>,

    /// Handle for the audio forwarding task
    forward_task: Mutex<Option<JoinHandle<()>>>,

    /// Handle for the session event task
    event_task: Mutex<Option<JoinHandle<()>>>,

    on_update: Arc<std::sync::Mutex<Option<FragmentCallback>>>,
    on_error: Arc<std::sync::Mutex<Option<ErrorCallback>>>,
}

impl LiveCaptureSession {
    pub fn new(config: CaptureSessionConfig) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            is_live: Arc::new(AtomicBool::new(false)),
            frames_sent: Arc::new(AtomicUsize::new(0)),
            fragments_received: Arc::new(AtomicUsize::new(0)),
            accumulator: Arc::new(Mutex::new(TranscriptAccumulator::new())),
            stream: Arc::new(Mutex::new(None)),
            backend: Mutex::new(None),
            forward_task: Mutex::new(None),
            event_task: Mutex::new(None),
            on_update: Arc::new(std::sync::Mutex::new(None)),
            on_error: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    pub fn capture_id(&self) -> &str {
        &self.config.capture_id
    }

    /// Register the per-fragment callback. Set before `start`.
    pub fn set_on_update(&self, callback: FragmentCallback) {
        if let Ok(mut slot) = self.on_update.lock() {
            *slot = Some(callback);
        }
    }

    /// Register the terminal-failure callback. Set before `start`.
    pub fn set_on_error(&self, callback: ErrorCallback) {
        if let Ok(mut slot) = self.on_error.lock() {
            *slot = Some(callback);
        }
    }

    /// Start capturing from `source` and streaming to the endpoint.
    ///
    /// Order matters: the streaming session must reach Open before the audio
    /// source is acquired. A `ConnectionFailure` here means no device was
    /// opened and no callback registered; a `CaptureUnavailable` means the
    /// session was opened and is closed again before returning.
    pub async fn start(&self, source: AudioSource) -> Result<()> {
        if self.is_live.load(Ordering::SeqCst) {
            warn!("Capture {} already live", self.config.capture_id);
            return Ok(());
        }

        info!("Starting capture {}", self.config.capture_id);

        let (session, events) = StreamSession::connect(&self.config.stream).await?;
        let session = Arc::new(session);

        let mut backend = CaptureBackendFactory::create(&source, self.config.audio.clone());
        let frame_rx = match backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        info!(
            "Capture {} using {} backend",
            self.config.capture_id,
            backend.name()
        );

        // New capture, fresh transcript.
        self.accumulator.lock().await.reset();
        self.frames_sent.store(0, Ordering::SeqCst);
        self.fragments_received.store(0, Ordering::SeqCst);
        self.is_live.store(true, Ordering::SeqCst);

        {
            let mut slot = self.stream.lock().await;
            *slot = Some(Arc::clone(&session));
        }
        {
            let mut slot = self.backend.lock().await;
            *slot = Some(backend);
        }

        let forward = tokio::spawn(forward_frames(
            frame_rx,
            Arc::clone(&self.stream),
            Arc::clone(&self.is_live),
            Arc::clone(&self.frames_sent),
            self.config.audio.frame_samples,
        ));
        {
            let mut slot = self.forward_task.lock().await;
            *slot = Some(forward);
        }

        let event = tokio::spawn(run_event_loop(EventLoop {
            events,
            stream: Arc::clone(&self.stream),
            stream_config: self.config.stream.clone(),
            reconnect: self.config.reconnect.clone(),
            accumulator: Arc::clone(&self.accumulator),
            is_live: Arc::clone(&self.is_live),
            fragments_received: Arc::clone(&self.fragments_received),
            on_update: Arc::clone(&self.on_update),
            on_error: Arc::clone(&self.on_error),
        }));
        {
            let mut slot = self.event_task.lock().await;
            *slot = Some(event);
        }

        info!("Capture {} live", self.config.capture_id);

        Ok(())
    }

    /// Stop the capture and release everything it holds.
    ///
    /// Release order: audio source first (no further frame production, device
    /// or tap freed), then the streaming session, then the worker tasks.
    pub async fn stop(&self) -> SessionStats {
        if !self.is_live.swap(false, Ordering::SeqCst) {
            // Not live anymore — but a capture that terminated on its own
            // (transport failure, remote close) may still hold its device
            // and tasks, so release whatever is left either way.
            warn!("Capture {} not live", self.config.capture_id);
        } else {
            info!("Stopping capture {}", self.config.capture_id);
        }

        let backend = self.backend.lock().await.take();
        if let Some(mut backend) = backend {
            if let Err(e) = backend.stop().await {
                error!("Failed to stop {} backend: {}", backend.name(), e);
            }
        }

        let session = self.stream.lock().await.take();
        if let Some(session) = session {
            session.close().await;
        }

        let forward = self.forward_task.lock().await.take();
        if let Some(task) = forward {
            if let Err(e) = task.await {
                error!("Forwarding task panicked: {}", e);
            }
        }

        let event = self.event_task.lock().await.take();
        if let Some(task) = event {
            if let Err(e) = task.await {
                error!("Event task panicked: {}", e);
            }
        }

        info!("Capture {} stopped", self.config.capture_id);

        self.stats().await
    }

    /// The live transcript accumulated so far.
    pub async fn transcript(&self) -> String {
        self.accumulator.lock().await.text().to_string()
    }

    /// Current session statistics.
    pub async fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            is_live: self.is_live.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            fragments_received: self.fragments_received.load(Ordering::SeqCst),
        }
    }
}

/// Encode captured frames and hand them to the active session.
///
/// Fire-and-forget relative to capture: `StreamSession::send` never blocks,
/// so a stalled network cannot back up into the audio path.
async fn forward_frames(
    mut frame_rx: mpsc::Receiver<AudioFrame>,
    stream: Arc<Mutex<Option<Arc<StreamSession>>>>,
    is_live: Arc<AtomicBool>,
    frames_sent: Arc<AtomicUsize>,
    frame_samples: usize,
) {
    info!("Audio forwarding task started");

    while let Some(frame) = frame_rx.recv().await {
        if !is_live.load(Ordering::SeqCst) {
            break;
        }

        let chunk = encode_frame(&frame, frame_samples);

        let session = {
            let slot = stream.lock().await;
            slot.clone()
        };
        if let Some(session) = session {
            session.send(chunk);
            frames_sent.fetch_add(1, Ordering::SeqCst);
        }
    }

    info!("Audio forwarding task stopped");
}

struct EventLoop {
    events: mpsc::Receiver<SessionEvent>,
    stream: Arc<Mutex<Option<Arc<StreamSession>>>>,
    stream_config: StreamConfig,
    reconnect: ReconnectPolicy,
    accumulator: Arc<Mutex<TranscriptAccumulator>>,
    is_live: Arc<AtomicBool>,
    fragments_received: Arc<AtomicUsize>,
    on_update: Arc<std::sync::Mutex<Option<FragmentCallback>>>,
    on_error: Arc<std::sync::Mutex<Option<ErrorCallback>>>,
}

/// Apply session events to the transcript; recover transport failures per
/// the reconnect policy.
///
/// A successful reconnect swaps the session in place and keeps appending to
/// the same transcript — only `start` resets it. Exhausted retries (or
/// FailFast) clear the live flag and notify the error callback so the caller
/// never sits on a stale "live" state.
async fn run_event_loop(mut ctx: EventLoop) {
    info!("Session event task started");

    'session: loop {
        let failure = loop {
            match ctx.events.recv().await {
                Some(SessionEvent::Fragment(fragment)) => {
                    {
                        let mut acc = ctx.accumulator.lock().await;
                        acc.append(&fragment);
                    }
                    ctx.fragments_received.fetch_add(1, Ordering::SeqCst);

                    if let Ok(slot) = ctx.on_update.lock() {
                        if let Some(callback) = slot.as_ref() {
                            callback(&fragment.text);
                        }
                    }
                }
                Some(SessionEvent::Closed) => {
                    info!("Remote endpoint closed the stream");
                    ctx.is_live.store(false, Ordering::SeqCst);
                    break 'session;
                }
                Some(SessionEvent::Error(message)) => break message,
                None => {
                    // Session torn down locally; stop() does the cleanup.
                    break 'session;
                }
            }
        };

        if !ctx.is_live.load(Ordering::SeqCst) {
            break;
        }

        match &ctx.reconnect {
            ReconnectPolicy::FailFast => {
                terminate(&ctx, failure);
                break;
            }
            ReconnectPolicy::Retry {
                max_attempts,
                initial_backoff,
            } => {
                let (max_attempts, initial_backoff) = (*max_attempts, *initial_backoff);
                let mut reconnected = false;

                for attempt in 1..=max_attempts {
                    let backoff = initial_backoff * attempt;
                    warn!(
                        "Transport error ({}), reconnecting in {:?} (attempt {}/{})",
                        failure, backoff, attempt, max_attempts
                    );
                    tokio::time::sleep(backoff).await;

                    if !ctx.is_live.load(Ordering::SeqCst) {
                        break 'session;
                    }

                    match StreamSession::connect(&ctx.stream_config).await {
                        Ok((session, events)) => {
                            let old = {
                                let mut slot = ctx.stream.lock().await;
                                slot.replace(Arc::new(session))
                            };
                            if let Some(old) = old {
                                old.close().await;
                            }
                            ctx.events = events;
                            info!("Streaming session re-established");
                            reconnected = true;
                            break;
                        }
                        Err(e) => {
                            warn!("Reconnect attempt {} failed: {}", attempt, e);
                        }
                    }
                }

                if !reconnected {
                    terminate(&ctx, failure);
                    break;
                }
            }
        }
    }

    info!("Session event task stopped");
}

/// Terminal transport failure: flag the capture dead and tell the caller.
fn terminate(ctx: &EventLoop, message: String) {
    error!("Capture terminated: {}", message);
    ctx.is_live.store(false, Ordering::SeqCst);

    if let Ok(slot) = ctx.on_error.lock() {
        if let Some(callback) = slot.as_ref() {
            callback(&EchoscribeError::Transport { message });
        }
    }
}
