use anyhow::{Context, Result};
use homeguard::api::{create_hub_router, HubAppState};
use homeguard::config::load_from_env;
use homeguard::media::FaceStore;
use homeguard::sensor::spawn_serial_reader;
use homeguard::state::HubState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homeguard=info".into()),
        )
        .init();

    info!("Homeguard hub starting...");

    let config = load_from_env().context("Failed to load configuration")?.hub;
    info!(
        bind_addr = %config.bind_addr,
        serial_port = %config.serial_port,
        faces_dir = %config.faces_dir.display(),
        known_faces_dir = %config.known_faces_dir.display(),
        "Configuration loaded"
    );

    let faces = Arc::new(
        FaceStore::open(&config.faces_dir, &config.known_faces_dir)
            .await
            .context("Failed to prepare face directories")?,
    );
    let hub = Arc::new(HubState::new(Duration::from_millis(config.vibration_pulse_ms)));

    // Sensor lines are read on a blocking worker and applied here in order
    let (reading_tx, mut reading_rx) = mpsc::channel(256);
    let serial_handle = spawn_serial_reader(&config.serial_port, config.baud_rate, reading_tx);
    let ingest_hub = Arc::clone(&hub);
    let ingest_handle = tokio::spawn(async move {
        while let Some(reading) = reading_rx.recv().await {
            ingest_hub.apply_reading(reading);
        }
    });

    let router = create_hub_router(Arc::new(HubAppState {
        hub: Arc::clone(&hub),
        faces,
    }));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Hub listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Hub server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    ingest_handle.abort();
    if let Some(handle) = serial_handle {
        handle.abort();
    }
    info!("Hub stopped");

    Ok(())
}
