//! Client side of the hub fanout.
//!
//! Nodes that consume hub events (door control, notifications) keep one
//! WebSocket open to `/api/ws`, receive [`HubMessage`]s and can push
//! [`ClientMessage`]s back through a [`HubPublisher`]. Delivery is at most
//! once: messages published while the connection is down are dropped.

mod outbound;

pub use outbound::{Delivery, EventSink, HttpEventSink};

use crate::event::{AccessEvent, ClientMessage, HubMessage};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Derive the hub WebSocket URL from its HTTP base URL.
pub fn ws_url(hub_url: &str) -> String {
    let base = hub_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        format!("ws://{}", base)
    };
    format!("{}/api/ws", base)
}

/// Upper bound on one connect plus WebSocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends client messages to the hub over the subscriber connection.
#[derive(Clone)]
pub struct HubPublisher {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl HubPublisher {
    /// Queue an access audit for the hub; never blocks.
    pub fn publish_access(&self, event: AccessEvent) {
        if self.tx.send(ClientMessage::NfcEvent(event)).is_err() {
            warn!("Hub client stopped, dropping access event");
        }
    }
}

/// Reconnecting hub subscriber
pub struct HubClient {
    url: String,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
}

impl HubClient {
    /// Create a client for `hub_url` together with its publisher handle.
    pub fn new(hub_url: &str, reconnect_delay: Duration) -> (Self, HubPublisher) {
        let (tx, outbound_rx) = mpsc::unbounded_channel();
        let client = Self {
            url: ws_url(hub_url),
            reconnect_delay,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            outbound_rx,
        };
        (client, HubPublisher { tx })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run the subscription forever, invoking `on_message` for every hub
    /// message in receipt order.
    pub async fn run<F>(mut self, mut on_message: F)
    where
        F: FnMut(HubMessage),
    {
        loop {
            match tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str())).await {
                Ok(Ok((ws_stream, _))) => {
                    info!(url = %self.url, "Connected to hub");
                    let (mut write, mut read) = ws_stream.split();

                    loop {
                        tokio::select! {
                            incoming = read.next() => {
                                match incoming {
                                    Some(Ok(Message::Text(text))) => {
                                        match serde_json::from_str::<HubMessage>(&text) {
                                            Ok(msg) => on_message(msg),
                                            Err(e) => debug!(error = %e, "Ignoring unrecognized hub message"),
                                        }
                                    }
                                    Some(Ok(Message::Ping(data))) => {
                                        if let Err(e) = write.send(Message::Pong(data)).await {
                                            warn!(error = %e, "Failed to answer hub ping");
                                            break;
                                        }
                                    }
                                    Some(Ok(Message::Close(_))) | None => break,
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        warn!(error = %e, "Hub connection error");
                                        break;
                                    }
                                }
                            }

                            outgoing = self.outbound_rx.recv() => {
                                let Some(msg) = outgoing else {
                                    info!("All hub publishers dropped, closing subscription");
                                    return;
                                };
                                match serde_json::to_string(&msg) {
                                    Ok(json) => {
                                        if let Err(e) = write.send(Message::Text(json)).await {
                                            warn!(error = %e, "Failed to publish to hub");
                                            break;
                                        }
                                    }
                                    Err(e) => error!(error = %e, "Failed to encode client message"),
                                }
                            }
                        }
                    }

                    warn!(url = %self.url, "Disconnected from hub");
                }
                Ok(Err(e)) => {
                    warn!(url = %self.url, error = %e, "Hub unreachable");
                }
                Err(_) => {
                    warn!(url = %self.url, timeout = ?self.connect_timeout, "Hub handshake timed out");
                }
            }

            tokio::time::sleep(self.reconnect_delay).await;
            self.drop_pending();
        }
    }

    /// Spawn the subscription on its own OS thread with a private runtime.
    ///
    /// `on_message` then runs on that thread, outside every other runtime.
    pub fn spawn_dedicated<F>(self, on_message: F) -> std::io::Result<std::thread::JoinHandle<()>>
    where
        F: FnMut(HubMessage) + Send + 'static,
    {
        std::thread::Builder::new()
            .name("hub-client".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "Failed to build hub client runtime");
                        return;
                    }
                };
                runtime.block_on(self.run(on_message));
            })
    }

    fn drop_pending(&mut self) {
        let mut dropped = 0usize;
        while self.outbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped = dropped, "Dropped messages published while disconnected");
        }
    }
}
