use anyhow::{Context, Result};
use clap::Parser;
use echoscribe::{create_router, AppState, Config};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "echoscribe", about = "Live audio transcription service")]
struct Args {
    /// Config file (without extension, e.g. config/echoscribe)
    #[arg(short, long, default_value = "config/echoscribe")]
    config: String,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("failed to load config: {}", args.config))?;

    let bind = args.bind.unwrap_or_else(|| cfg.service.http.bind.clone());
    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", bind, port);

    info!("{} starting", cfg.service.name);
    info!("Streaming endpoint: {}", cfg.stream.endpoint);

    let state = AppState::new(cfg);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("HTTP control API listening on {}", addr);

    axum::serve(listener, router)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
