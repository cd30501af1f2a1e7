use anyhow::{Context, Result};
use homeguard::config::load_from_env;
use homeguard::cooldown::CooldownGate;
use homeguard::hub_client::HttpEventSink;
use homeguard::recognition::{
    create_camera_router, CameraAppState, HttpRecognizer, NoopRecognizer, PipelineContext, Recognizer,
    SharedRoster, ViewerSet,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homeguard=info,camera_node=info".into()),
        )
        .init();

    info!("Camera node starting...");

    let config = load_from_env().context("Failed to load configuration")?.camera;
    info!(
        bind_addr = %config.bind_addr,
        camera_id = %config.camera_id,
        hub_url = %config.hub_url,
        process_every = config.process_every,
        "Configuration loaded"
    );

    let recognizer: Arc<dyn Recognizer> = match &config.recognizer_url {
        Some(url) => Arc::new(
            HttpRecognizer::new(url, Duration::from_secs(5)).context("Failed to create recognizer client")?,
        ),
        None => {
            warn!("No recognizer configured, frames are forwarded without recognition");
            Arc::new(NoopRecognizer)
        }
    };
    let sink = Arc::new(
        HttpEventSink::new(&config.hub_url, Duration::from_secs(2)).context("Failed to create hub client")?,
    );

    let roster = SharedRoster::load(&config.known_faces_dir);
    info!(enrolled = roster.current().names().len(), "Roster loaded");

    let state = Arc::new(CameraAppState {
        pipeline: PipelineContext {
            camera_id: config.camera_id.clone(),
            process_every: config.process_every,
            event_cooldown: Duration::from_secs(config.event_cooldown_secs),
            recognizer,
            roster,
            gate: Arc::new(CooldownGate::new()),
            sink,
            viewers: ViewerSet::new(),
        },
        max_frame_bytes: config.max_frame_bytes,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Camera stream listening");

    let router = create_camera_router(state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Camera server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Camera node stopped");

    Ok(())
}
