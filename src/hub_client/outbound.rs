use crate::event::FaceEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a best-effort delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed,
}

/// Outbound sink for face events.
///
/// Implementations never retry; a failed delivery is reported, not raised.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &FaceEvent) -> Delivery;
}

/// Posts face events to the hub's `/api/face-event`.
pub struct HttpEventSink {
    endpoint: String,
    http_client: Client,
}

impl HttpEventSink {
    pub fn new(hub_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            endpoint: format!("{}/api/face-event", hub_url.trim_end_matches('/')),
            http_client,
        })
    }

    async fn post(&self, event: &FaceEvent) -> Result<()> {
        self.http_client
            .post(&self.endpoint)
            .json(&event.to_payload())
            .send()
            .await
            .context("Failed to send face event")?
            .error_for_status()
            .context("Hub rejected face event")?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn deliver(&self, event: &FaceEvent) -> Delivery {
        match self.post(event).await {
            Ok(()) => {
                debug!(identity = %event.identity, "Face event delivered");
                Delivery::Delivered
            }
            Err(e) => {
                warn!(identity = %event.identity, error = %e, "Failed to send face event");
                Delivery::Failed
            }
        }
    }
}
