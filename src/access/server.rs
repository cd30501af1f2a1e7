use super::AccessGateway;
use crate::event::DoorCommand;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Door node router: NFC readers connect on `/` or `/ws`.
pub fn create_door_router(gateway: Arc<AccessGateway>) -> Router {
    Router::new()
        .route("/", get(device_handler))
        .route("/ws", get(device_handler))
        .with_state(gateway)
}

async fn device_handler(ws: WebSocketUpgrade, State(gateway): State<Arc<AccessGateway>>) -> Response {
    ws.on_upgrade(move |socket| handle_device(socket, gateway))
}

/// One device connection: answers credentials and drains handed-off commands.
async fn handle_device(mut socket: WebSocket, gateway: Arc<AccessGateway>) {
    let (device_id, mut commands) = gateway.devices().register();

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                match msg {
                    Ok(Message::Text(text)) => {
                        let Some(outcome) = gateway.handle_device_message(&text) else {
                            continue;
                        };
                        let sent = send_command(&mut socket, &outcome.reply).await;
                        gateway.record(outcome.audit);
                        if let Err(e) = sent {
                            warn!(device_id = %device_id, error = %e, "Failed to answer device");
                            break;
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(device_id = %device_id, error = %e, "Device connection error");
                        break;
                    }
                }
            }

            Some(command) = commands.recv() => {
                if let Err(e) = send_command(&mut socket, &command).await {
                    warn!(device_id = %device_id, error = %e, "Failed to deliver door command");
                    break;
                }
            }

            else => break,
        }
    }

    gateway.devices().deregister(&device_id);
    info!(device_id = %device_id, "Device disconnected");
}

async fn send_command(socket: &mut WebSocket, command: &DoorCommand) -> anyhow::Result<()> {
    let json = serde_json::to_string(command)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
