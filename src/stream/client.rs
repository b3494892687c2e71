use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::{RealtimeInput, ServerMessage, SetupMessage};
use crate::audio::EncodedChunk;
use crate::error::{EchoscribeError, Result};
use crate::transcript::TranscriptFragment;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SharedState = Arc<Mutex<SessionState>>;

/// Configuration for one streaming session.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint of the transcription service
    pub endpoint: String,

    /// API key, appended as a query parameter when present
    pub api_key: Option<String>,

    /// Handshake deadline; a hung connect surfaces as ConnectionFailure
    pub connect_timeout: Duration,

    /// Bound on the outbound frame queue. A full queue drops the newest
    /// chunk rather than buffering without limit.
    pub send_queue_depth: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:9030/v1/live".to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
            send_queue_depth: 32,
        }
    }
}

/// Connection state of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Events delivered to the session's consumer, in arrival order.
#[derive(Debug)]
pub enum SessionEvent {
    /// One transcript fragment from the input transcription
    Fragment(TranscriptFragment),
    /// Remote end closed the stream cleanly
    Closed,
    /// Transport failed mid-stream; the session is no longer usable
    Error(String),
}

/// One live connection to the remote transcription endpoint.
///
/// `connect()` is the constructor: a session that exists is a session that
/// reached Open. Exactly one session is active per capture, owned by the
/// capture controller. Outbound chunks are forwarded in capture order by a
/// writer task; inbound transcript fragments are delivered in arrival order
/// through the event channel returned by `connect()`.
pub struct StreamSession {
    state: SharedState,
    outbound: mpsc::Sender<EncodedChunk>,
    shutdown: watch::Sender<bool>,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl StreamSession {
    /// Open the transport, perform the setup exchange, and spawn the
    /// writer/reader tasks.
    ///
    /// Fails with `ConnectionFailure` on refused/unreachable endpoints, a
    /// failed handshake, or a handshake that outlives the connect timeout.
    pub async fn connect(
        config: &StreamConfig,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        let state: SharedState = Arc::new(Mutex::new(SessionState::Connecting));

        let url = match &config.api_key {
            Some(key) => format!("{}?key={}", config.endpoint, key),
            None => config.endpoint.clone(),
        };

        debug!("Connecting to streaming endpoint: {}", config.endpoint);

        let handshake = tokio::time::timeout(config.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| EchoscribeError::ConnectionFailure {
                reason: format!(
                    "handshake timed out after {}s",
                    config.connect_timeout.as_secs()
                ),
            })?;

        let (ws, _response) = handshake.map_err(|e| EchoscribeError::ConnectionFailure {
            reason: e.to_string(),
        })?;

        let (mut ws_tx, ws_rx) = ws.split();

        let setup = serde_json::to_string(&SetupMessage::new()).map_err(|e| {
            EchoscribeError::ConnectionFailure {
                reason: format!("failed to serialize setup message: {}", e),
            }
        })?;
        ws_tx
            .send(Message::Text(setup))
            .await
            .map_err(|e| EchoscribeError::ConnectionFailure {
                reason: format!("setup send failed: {}", e),
            })?;

        set_state(&state, SessionState::Open);
        info!("Streaming session open: {}", config.endpoint);

        let (event_tx, event_rx) = mpsc::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_queue_depth.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let writer = tokio::spawn(write_loop(
            ws_tx,
            outbound_rx,
            shutdown_rx.clone(),
            Arc::clone(&state),
            event_tx.clone(),
        ));
        let reader = tokio::spawn(read_loop(ws_rx, shutdown_rx, Arc::clone(&state), event_tx));

        Ok((
            Self {
                state,
                outbound: outbound_tx,
                shutdown: shutdown_tx,
                writer: Mutex::new(Some(writer)),
                reader: Mutex::new(Some(reader)),
            },
            event_rx,
        ))
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionState::Errored)
    }

    /// Queue an encoded chunk for the remote endpoint.
    ///
    /// Permitted only while Open; in any other state the chunk is silently
    /// dropped. Never blocks and never fails: the audio path must not stall
    /// on the network.
    pub fn send(&self, chunk: EncodedChunk) {
        if self.state() != SessionState::Open {
            debug!("Session not open, dropping audio chunk");
            return;
        }

        match self.outbound.try_send(chunk) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full, dropping audio chunk");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Writer task gone, dropping audio chunk");
            }
        }
    }

    /// Close the session and release the transport. Idempotent.
    pub async fn close(&self) {
        {
            let Ok(mut st) = self.state.lock() else { return };
            if *st == SessionState::Closed {
                return;
            }
            *st = SessionState::Closed;
        }

        let _ = self.shutdown.send(true);

        let writer = self.writer.lock().ok().and_then(|mut g| g.take());
        if let Some(handle) = writer {
            let _ = handle.await;
        }
        let reader = self.reader.lock().ok().and_then(|mut g| g.take());
        if let Some(handle) = reader {
            let _ = handle.await;
        }

        info!("Streaming session closed");
    }
}

fn set_state(state: &SharedState, next: SessionState) {
    if let Ok(mut st) = state.lock() {
        *st = next;
    }
}

/// Mark the session Errored (unless already Closed) and notify the consumer.
async fn fail_session(state: &SharedState, events: &mpsc::Sender<SessionEvent>, message: String) {
    let mut notify = false;
    if let Ok(mut st) = state.lock() {
        if *st != SessionState::Closed {
            *st = SessionState::Errored;
            notify = true;
        }
    }
    if notify {
        warn!("Streaming session transport error: {}", message);
        let _ = events.send(SessionEvent::Error(message)).await;
    }
}

/// Drain the outbound queue into the socket, in FIFO order.
async fn write_loop(
    mut ws_tx: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<EncodedChunk>,
    mut shutdown: watch::Receiver<bool>,
    state: SharedState,
    events: mpsc::Sender<SessionEvent>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                // Best-effort goodbye; the transport is going away either way.
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            chunk = outbound.recv() => {
                let Some(chunk) = chunk else { break };

                let text = match serde_json::to_string(&RealtimeInput::from(chunk)) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize realtime input: {}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    fail_session(&state, &events, format!("send failed: {}", e)).await;
                    break;
                }
            }
        }
    }

    debug!("Writer task stopped");
}

/// Relay inbound transcript events until shutdown, remote close, or failure.
async fn read_loop(
    mut ws_rx: SplitStream<WsStream>,
    mut shutdown: watch::Receiver<bool>,
    state: SharedState,
    events: mpsc::Sender<SessionEvent>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(server_msg) => {
                            if let Some(fragment_text) = server_msg.transcription_text() {
                                let fragment = TranscriptFragment::new(fragment_text);
                                if events.send(SessionEvent::Fragment(fragment)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Unparseable server message: {}", e);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    if let Ok(mut st) = state.lock() {
                        if *st == SessionState::Open {
                            *st = SessionState::Closed;
                        }
                    }
                    let _ = events.send(SessionEvent::Closed).await;
                    break;
                }
                Some(Ok(_)) => {} // ping/pong/binary: not ours
                Some(Err(e)) => {
                    fail_session(&state, &events, e.to_string()).await;
                    break;
                }
            }
        }
    }

    debug!("Reader task stopped");
}
