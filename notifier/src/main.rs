use anyhow::{Context, Result};
use homeguard::config::load_from_env;
use homeguard::hub_client::HubClient;
use notifier::alerts::AlertSettings;
use notifier::{run_command_loop, AlertDispatcher, AlertQueue, CommandHandler, SubscriberRegistry, TelegramClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notifier=info,homeguard=info".into()),
        )
        .init();

    info!("Notifier starting...");

    let config = load_from_env().context("Failed to load configuration")?.notifier;
    let token = config
        .resolve_token()
        .context("TELEGRAM_TOKEN is required (or notifier.telegram_token in the config file)")?;

    info!(
        hub_url = %config.hub_url,
        subscribers_dir = %config.subscribers_dir.display(),
        "Configuration loaded"
    );

    let registry = Arc::new(
        SubscriberRegistry::open(&config.subscribers_dir).context("Failed to load subscribers")?,
    );
    let telegram = Arc::new(
        TelegramClient::new(&config.telegram_api_url, &token).context("Failed to create Bot API client")?,
    );
    let alerts = Arc::new(AlertDispatcher::new(
        telegram.clone(),
        Arc::clone(&registry),
        AlertSettings {
            hub_url: config.hub_url.clone(),
            vibration_window: Duration::from_secs(config.vibration_cooldown_secs),
            face_window: Duration::from_secs(config.face_cooldown_secs),
            camera_lat: config.camera_lat,
            camera_lon: config.camera_lon,
        },
    ));

    // The publisher handle keeps the subscription open; the notifier never publishes
    let (hub_client, _hub_publisher) = HubClient::new(&config.hub_url, Duration::from_secs(3));
    let (alert_queue, dispatch_handle) = AlertQueue::spawn(Arc::clone(&alerts));
    let hub_handle = tokio::spawn(hub_client.run(move |msg| {
        alert_queue.push(msg);
    }));

    let handler = CommandHandler::new(telegram.clone(), Arc::clone(&registry), alerts);
    let command_handle = tokio::spawn(run_command_loop(telegram, handler));
    info!("Notifier running");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    hub_handle.abort();
    dispatch_handle.abort();
    command_handle.abort();
    info!("Notifier stopped");

    Ok(())
}
