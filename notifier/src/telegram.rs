use crate::subscribers::SubscriberId;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use homeguard::hub_client::Delivery;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Long-poll wait passed to `getUpdates`
pub const POLL_TIMEOUT_SECS: u64 = 30;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: SubscriberId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

/// One entry of a `getUpdates` result
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

/// Outbound chat capability.
///
/// Sends are best effort: failures are logged by the implementation and
/// reported as [`Delivery::Failed`], never raised.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat: SubscriberId, text: &str, keyboard: Option<&InlineKeyboard>) -> Delivery;

    async fn send_photo(&self, chat: SubscriberId, photo_url: &str, caption: &str) -> Delivery;

    async fn send_location(&self, chat: SubscriberId, latitude: f64, longitude: f64) -> Delivery;
}

/// Telegram Bot API client
pub struct TelegramClient {
    base_url: String,
    http_client: Client,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    /// `api_url` is the Bot API root, e.g. `https://api.telegram.org`.
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            http_client,
            poll_timeout_secs: POLL_TIMEOUT_SECS,
        })
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let response: UpdatesResponse = self
            .http_client
            .get(self.url("getUpdates"))
            .query(&[("timeout", self.poll_timeout_secs as i64), ("offset", offset)])
            .timeout(Duration::from_secs(self.poll_timeout_secs + 5))
            .send()
            .await
            .context("Failed to poll updates")?
            .json()
            .await
            .context("Failed to parse updates")?;

        if !response.ok {
            bail!("getUpdates returned ok=false");
        }
        Ok(response.result)
    }

    async fn call(&self, method: &str, payload: Value) -> Delivery {
        let result = self
            .http_client
            .post(self.url(method))
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => {
                debug!(method = method, "Bot API call succeeded");
                Delivery::Delivered
            }
            Err(e) => {
                warn!(method = method, error = %e, "Bot API call failed");
                Delivery::Failed
            }
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat: SubscriberId, text: &str, keyboard: Option<&InlineKeyboard>) -> Delivery {
        let mut payload = json!({
            "chat_id": chat,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = json!(keyboard);
        }
        self.call("sendMessage", payload).await
    }

    async fn send_photo(&self, chat: SubscriberId, photo_url: &str, caption: &str) -> Delivery {
        self.call(
            "sendPhoto",
            json!({
                "chat_id": chat,
                "photo": photo_url,
                "caption": caption,
                "parse_mode": "Markdown",
            }),
        )
        .await
    }

    async fn send_location(&self, chat: SubscriberId, latitude: f64, longitude: f64) -> Delivery {
        self.call(
            "sendLocation",
            json!({
                "chat_id": chat,
                "latitude": latitude,
                "longitude": longitude,
            }),
        )
        .await
    }
}
