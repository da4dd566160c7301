use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stillfade_core::{
    load_config, validate_config, Engine, FfmpegEngine, LoadOptions, Session, SessionEvent,
    SessionUpdateCallback,
};
use stillfade_server::api::{create_router, WsBroadcaster};
use stillfade_server::state::AppState;

/// Interval between WebSocket heartbeats
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("STILLFADE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("FFmpeg path: {:?}", config.engine.ffmpeg_path);
    info!("Engine assets: {:?} at {}", config.assets.dir, config.assets.base_path);

    // Create WebSocket broadcaster (before the session so it can receive the callback)
    let ws_broadcaster = WsBroadcaster::default();
    let heartbeat = ws_broadcaster.spawn_heartbeat(HEARTBEAT_INTERVAL);

    let broadcaster_for_callback = ws_broadcaster.clone();
    let update_callback: SessionUpdateCallback =
        Arc::new(move |event: &SessionEvent| broadcaster_for_callback.session_event(event));

    // Create engine and session
    let engine: Arc<dyn Engine> = Arc::new(FfmpegEngine::new(config.engine.clone()));
    info!("Using engine: {}", engine.name());

    let load_options = LoadOptions::new(config.assets.core_url(), config.assets.wasm_url());
    let session = Arc::new(
        Session::new(engine, load_options)
            .with_update_callback(update_callback)
            .with_load_hint(format!(
                "ffmpeg_path = {}",
                config.engine.ffmpeg_path.display()
            )),
    );

    // Load the engine in the background; requests see `loading` until it finishes
    let init_session = Arc::clone(&session);
    tokio::spawn(async move {
        init_session.initialize().await;
    });

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), session, ws_broadcaster));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    heartbeat.abort();

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
