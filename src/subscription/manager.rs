use crate::event::{ClientMessage, HubMessage};
use crate::state::HubState;
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Manages a single hub WebSocket connection (dashboard or node subscriber)
pub struct ConnectionManager {
    hub: Arc<HubState>,
}

impl ConnectionManager {
    pub fn new(hub: Arc<HubState>) -> Self {
        Self { hub }
    }

    /// Handle WebSocket connection lifecycle
    ///
    /// The connection's broadcast receiver is dropped when this returns, which
    /// removes it from the fanout set exactly once.
    pub async fn handle(self, mut socket: WebSocket) {
        let mut hub_rx = self.hub.subscribe();
        info!(subscribers = self.hub.subscriber_count(), "WebSocket connection established");

        // New viewers get the current snapshot right away
        let snapshot = HubMessage::Update(self.hub.snapshot());
        if let Err(e) = send_hub_message(&mut socket, &snapshot).await {
            warn!(error = %e, "Failed to send initial snapshot");
            return;
        }

        loop {
            tokio::select! {
                // Handle incoming client messages
                msg = socket.recv() => {
                    let Some(msg) = msg else {
                        break;
                    };
                    match msg {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_client_message(&text) {
                                warn!(error = %e, "Ignoring malformed client message");
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!("WebSocket client disconnected");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {
                            // Ignore binary, pong messages
                        }
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Forward hub messages
                result = hub_rx.recv() => {
                    match result {
                        Ok(msg) => {
                            if let Err(e) = send_hub_message(&mut socket, &msg).await {
                                error!(error = %e, "Failed to send hub message");
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "WebSocket lagged, skipped hub messages");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            error!("Hub broadcast channel closed");
                            break;
                        }
                    }
                }

                else => {
                    break;
                }
            }
        }

        info!("WebSocket connection closed");
    }

    /// Handle client message (access audit relay)
    fn handle_client_message(&self, text: &str) -> anyhow::Result<()> {
        let msg: ClientMessage = serde_json::from_str(text)?;

        match msg {
            ClientMessage::NfcEvent(event) => self.hub.publish_access(event),
        }

        Ok(())
    }
}

async fn send_hub_message(socket: &mut WebSocket, msg: &HubMessage) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
