use anyhow::{bail, Context, Result};
use clap::Parser;
use lookout_client::capture::StillImageSource;
use lookout_client::location::{FixedLocationProvider, LocationProvider};
use lookout_client::{
    create_router, AppState, Config, LogAnnouncer, LoopbackTransport, SessionDeps, SessionManager,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lookout")]
#[command(about = "Camera and location companion for the LookOut assistant")]
struct Args {
    /// Config file, without extension
    #[arg(short, long, default_value = "config/lookout")]
    config: String,

    /// Image to use as the camera feed
    #[arg(long)]
    still_image: Option<String>,

    /// Room to join, overriding the config
    #[arg(long)]
    room: Option<String>,

    /// Run against the in-process loopback transport; no media server is contacted
    #[arg(long)]
    loopback: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(room) = args.room {
        cfg.session.room = room;
    }

    info!("LookOut client v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    if !args.loopback {
        bail!("No media transport is available in this build; pass --loopback to run in-process");
    }
    warn!(
        "Using loopback transport: {} is not contacted, room {} exists only in this process",
        cfg.session.endpoint, cfg.session.room
    );

    let still_image = args.still_image.or_else(|| cfg.capture.still_image.clone());
    let video = match still_image {
        Some(path) => StillImageSource::open(&path)?,
        None => {
            warn!("No camera feed configured; frames will be skipped");
            StillImageSource::empty()
        }
    };

    // Keeps the watch open when no provider is configured
    let (_idle_locations, mut locations) = mpsc::channel(1);
    if let Some(sample) = cfg.location.fixed_sample() {
        let mut provider = FixedLocationProvider::new(sample);
        locations = provider
            .watch(cfg.location.watch_options())
            .await
            .with_context(|| format!("Failed to watch {} location", provider.name()))?;
    } else {
        warn!("No location provider configured");
    }

    // Counts only; payloads are not retained
    let (transport, transport_events) = LoopbackTransport::with_history(0);
    let deps = SessionDeps {
        issuer: Arc::new(cfg.credentials.issuer()),
        transport: Arc::new(transport),
        transport_events,
        video: Arc::new(video),
        locations,
        announcer: Arc::new(LogAnnouncer),
    };

    let (manager, handle) =
        SessionManager::new(cfg.session, cfg.capture.sampler(), cfg.capture.facing, deps);
    let manager_task = manager.spawn();
    handle.start().await?;

    let app = create_router(AppState::new(handle.clone()));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    handle.shutdown();
    manager_task.await?;

    Ok(())
}
