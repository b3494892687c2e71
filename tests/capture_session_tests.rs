// End-to-end capture tests: media tap → encoder → streaming session →
// accumulator, against an in-process endpoint standing in for the
// transcription service.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use echoscribe::audio::{AudioSource, CaptureConfig};
use echoscribe::stream::StreamConfig;
use echoscribe::{
    CaptureSessionConfig, EchoscribeError, LiveCaptureSession, ReconnectPolicy,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

fn write_wav_fixture(dir: &tempfile::TempDir, seconds: f64) -> PathBuf {
    let path = dir.path().join("speech.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..(16000.0 * seconds) as usize {
        let t = i as f64 / 16000.0;
        let value = ((t * 220.0 * 2.0 * std::f64::consts::PI).sin() * 0.4 * 32767.0) as i16;
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();

    path
}

fn session_config(endpoint: String) -> CaptureSessionConfig {
    CaptureSessionConfig {
        capture_id: "capture-test".to_string(),
        audio: CaptureConfig {
            sample_rate: 16000,
            frame_samples: 512,
            queue_depth: 32,
        },
        stream: StreamConfig {
            endpoint,
            api_key: None,
            connect_timeout: Duration::from_secs(2),
            send_queue_depth: 32,
        },
        reconnect: ReconnectPolicy::FailFast,
    }
}

/// Fake endpoint: validates the setup message, then answers the first audio
/// frame with the given transcript fragments, one message each.
fn spawn_endpoint(
    listener: TcpListener,
    fragments: Vec<&'static str>,
) -> tokio::task::JoinHandle<usize> {
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let setup = ws.next().await.unwrap().unwrap().into_text().unwrap();
        assert!(setup.contains("\"setup\""));

        let mut media_messages = 0;
        let mut sent_fragments = false;

        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                break;
            }
            let Ok(text) = msg.into_text() else { continue };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                continue;
            };

            if value.get("media").is_some() {
                media_messages += 1;

                if !sent_fragments {
                    sent_fragments = true;
                    for fragment in &fragments {
                        let reply = format!(
                            r#"{{"serverContent": {{"inputTranscription": {{"text": "{}"}}}}}}"#,
                            fragment
                        );
                        ws.send(Message::Text(reply)).await.unwrap();
                    }
                }
            }
        }

        media_messages
    })
}

#[tokio::test]
async fn test_media_capture_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    let server = spawn_endpoint(listener, vec!["The quick", "brown fox"]);

    let dir = tempfile::tempdir().unwrap();
    let path = write_wav_fixture(&dir, 0.5);

    let session = LiveCaptureSession::new(session_config(endpoint));

    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let received_clone = Arc::clone(&received);
    session.set_on_update(Box::new(move |text| {
        received_clone.lock().unwrap().push(text.to_string());
    }));

    session
        .start(AudioSource::MediaTap {
            path: path.display().to_string(),
        })
        .await
        .expect("capture should start");

    assert!(session.stats().await.is_live);

    // Wait for both fragments to land (playback is ~0.5s, fragments arrive
    // after the first frame)
    let mut waited = Duration::ZERO;
    while session.stats().await.fragments_received < 2 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
        assert!(waited < Duration::from_secs(5), "fragments never arrived");
    }

    assert_eq!(session.transcript().await, "The quick brown fox");
    assert_eq!(
        *received.lock().unwrap(),
        vec!["The quick".to_string(), "brown fox".to_string()],
        "on_update must see exactly each fragment's text, in order"
    );

    let stats = session.stop().await;
    assert!(!stats.is_live);
    assert!(stats.frames_sent >= 1);
    assert_eq!(stats.fragments_received, 2);

    // Transcript survives stop; only the next start resets it
    assert_eq!(session.transcript().await, "The quick brown fox");

    let media_messages = server.await.unwrap();
    assert!(media_messages >= 1, "endpoint should have received frames");
}

#[tokio::test]
async fn test_connect_refused_reports_connection_failure() {
    // Learn a free port, then release it so the connect is refused
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let path = write_wav_fixture(&dir, 0.25);

    let session = LiveCaptureSession::new(session_config(endpoint));

    match session
        .start(AudioSource::MediaTap {
            path: path.display().to_string(),
        })
        .await
    {
        Err(EchoscribeError::ConnectionFailure { .. }) => {}
        Ok(_) => panic!("expected ConnectionFailure"),
        Err(e) => panic!("unexpected error: {}", e),
    }

    // The audio source was never acquired and nothing was captured
    let stats = session.stats().await;
    assert!(!stats.is_live);
    assert_eq!(stats.frames_sent, 0);
    assert_eq!(session.transcript().await, "");
}

#[tokio::test]
async fn test_capture_unavailable_closes_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());

    // Endpoint accepts and then expects the client to go away again
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _setup = ws.next().await.unwrap().unwrap();

        // Connection should close without any media ever arriving
        while let Some(Ok(msg)) = ws.next().await {
            assert!(!msg.is_text(), "no media expected: {:?}", msg);
            if msg.is_close() {
                break;
            }
        }
    });

    let session = LiveCaptureSession::new(session_config(endpoint));

    match session
        .start(AudioSource::MediaTap {
            path: "/no/such/media.mp4".to_string(),
        })
        .await
    {
        Err(EchoscribeError::CaptureUnavailable { .. }) => {}
        Ok(_) => panic!("expected CaptureUnavailable"),
        Err(e) => panic!("unexpected error: {}", e),
    }

    assert!(!session.stats().await.is_live);
    server.await.unwrap();
}

#[tokio::test]
async fn test_stop_without_start_is_safe() {
    let session = LiveCaptureSession::new(session_config("ws://localhost:1".to_string()));

    let stats = session.stop().await;
    assert!(!stats.is_live);
    assert_eq!(stats.frames_sent, 0);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    let server = spawn_endpoint(listener, vec!["hello"]);

    let dir = tempfile::tempdir().unwrap();
    let path = write_wav_fixture(&dir, 0.25);

    let session = LiveCaptureSession::new(session_config(endpoint));
    session
        .start(AudioSource::MediaTap {
            path: path.display().to_string(),
        })
        .await
        .expect("capture should start");

    let first = session.stop().await;
    let second = session.stop().await;

    assert!(!first.is_live);
    assert!(!second.is_live);

    server.await.unwrap();
}
