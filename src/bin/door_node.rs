use anyhow::{Context, Result};
use homeguard::access::{create_door_router, AccessGateway, CredentialTable};
use homeguard::config::load_from_env;
use homeguard::hub_client::HubClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homeguard=info,door_node=info".into()),
        )
        .init();

    info!("Door node starting...");

    let config = load_from_env().context("Failed to load configuration")?.door;
    let credentials = CredentialTable::from_map(&config.credentials);
    info!(
        bind_addr = %config.bind_addr,
        hub_url = %config.hub_url,
        enrolled = credentials.len(),
        "Configuration loaded"
    );

    let (hub_client, publisher) = HubClient::new(&config.hub_url, Duration::from_secs(3));
    let gateway = Arc::new(AccessGateway::new(credentials, Arc::new(publisher)));

    // Face grants arrive on the hub client thread and are handed off to the
    // device connections running on this runtime
    let hub_gateway = Arc::clone(&gateway);
    hub_client
        .spawn_dedicated(move |msg| hub_gateway.handle_hub_message(&msg))
        .context("Failed to start hub client thread")?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Door gateway listening");

    let router = create_door_router(gateway);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Door server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Door node stopped");

    Ok(())
}
