// Live capture demo: stream a media file's audio track to the transcription
// endpoint and print the transcript as it arrives.
//
// The endpoint is taken from config/echoscribe.toml (override with
// ECHOSCRIBE_STREAM__ENDPOINT); the API key from the env var named there.
//
// Usage: cargo run --example live_capture -- path/to/talk.mp4 [seconds]

use std::time::Duration;

use anyhow::{bail, Context, Result};
use echoscribe::{AudioSource, CaptureSessionConfig, Config, LiveCaptureSession};
use tokio::time::sleep;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: live_capture <media file> [seconds]");
    };
    let seconds: u64 = std::env::args()
        .nth(2)
        .map(|s| s.parse())
        .transpose()
        .context("seconds must be a number")?
        .unwrap_or(30);

    let cfg = Config::load("config/echoscribe").context("failed to load config")?;

    let config = CaptureSessionConfig {
        audio: cfg.capture_config(),
        stream: cfg.stream_config(),
        reconnect: cfg.reconnect_policy(),
        ..CaptureSessionConfig::default()
    };

    info!("Starting live capture of {} for {}s", path, seconds);
    info!("Streaming to {}", cfg.stream.endpoint);

    let session = LiveCaptureSession::new(config);
    session.set_on_update(Box::new(|fragment| {
        println!("{}", fragment);
    }));
    session.set_on_error(Box::new(|err| {
        eprintln!("capture failed: {}", err);
    }));

    session.start(AudioSource::MediaTap { path }).await?;

    // Capture for the requested window (or until a terminal transport
    // failure flips the live flag), then collect the final transcript.
    for _ in 0..seconds {
        sleep(Duration::from_secs(1)).await;
        if !session.stats().await.is_live {
            break;
        }
    }

    let stats = session.stop().await;
    let transcript = session.transcript().await;

    info!(
        "Capture complete: {} frames sent, {} fragments received",
        stats.frames_sent, stats.fragments_received
    );
    println!("---");
    println!("{}", transcript);

    Ok(())
}
