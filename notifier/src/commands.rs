use crate::alerts::AlertDispatcher;
use crate::subscribers::{SubscriberId, SubscriberRegistry, SubscriberSet};
use crate::telegram::{InlineButton, InlineKeyboard, Messenger, TelegramClient, Update};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Alert classes a chat can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertClass {
    Vibration,
    Nfc,
    Face,
}

impl AlertClass {
    fn set(&self) -> SubscriberSet {
        match self {
            AlertClass::Vibration => SubscriberSet::Vibration,
            AlertClass::Nfc => SubscriberSet::Nfc,
            AlertClass::Face => SubscriberSet::Face,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AlertClass::Vibration => "vibration",
            AlertClass::Nfc => "NFC",
            AlertClass::Face => "FACE",
        }
    }
}

/// Menu button actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Status,
    Subscribe(AlertClass),
    Unsubscribe(AlertClass),
}

impl MenuAction {
    pub fn parse(data: &str) -> Option<Self> {
        Some(match data {
            "status" => MenuAction::Status,
            "sub_vib" => MenuAction::Subscribe(AlertClass::Vibration),
            "unsub_vib" => MenuAction::Unsubscribe(AlertClass::Vibration),
            "sub_nfc" => MenuAction::Subscribe(AlertClass::Nfc),
            "unsub_nfc" => MenuAction::Unsubscribe(AlertClass::Nfc),
            "sub_face" => MenuAction::Subscribe(AlertClass::Face),
            "unsub_face" => MenuAction::Unsubscribe(AlertClass::Face),
            _ => return None,
        })
    }
}

fn button(text: &str, data: &str) -> InlineButton {
    InlineButton {
        text: text.to_string(),
        callback_data: data.to_string(),
    }
}

/// Inline keyboard sent in reply to `/menu`
pub fn main_menu() -> InlineKeyboard {
    InlineKeyboard {
        inline_keyboard: vec![
            vec![button("📊 Status", "status")],
            vec![
                button("📳 Subscribe Vibration", "sub_vib"),
                button("❌ Unsubscribe Vibration", "unsub_vib"),
            ],
            vec![
                button("🔐 Subscribe NFC", "sub_nfc"),
                button("🚫 Unsubscribe NFC", "unsub_nfc"),
            ],
            vec![
                button("👤 Subscribe Face", "sub_face"),
                button("🚫 Unsubscribe Face", "unsub_face"),
            ],
        ],
    }
}

/// Applies chat commands and menu actions to the subscriber registry.
pub struct CommandHandler {
    messenger: Arc<dyn Messenger>,
    registry: Arc<SubscriberRegistry>,
    alerts: Arc<AlertDispatcher>,
}

impl CommandHandler {
    pub fn new(messenger: Arc<dyn Messenger>, registry: Arc<SubscriberRegistry>, alerts: Arc<AlertDispatcher>) -> Self {
        Self {
            messenger,
            registry,
            alerts,
        }
    }

    pub async fn handle_update(&self, update: &Update) {
        if let Some(callback) = &update.callback_query {
            match (&callback.message, callback.data.as_deref()) {
                (Some(message), Some(data)) => match MenuAction::parse(data) {
                    Some(action) => self.handle_action(message.chat.id, action).await,
                    None => debug!(data = %data, "Ignoring unknown menu action"),
                },
                _ => debug!(update_id = update.update_id, "Ignoring incomplete callback"),
            }
        }

        if let Some(message) = &update.message {
            if let Some(text) = message.text.as_deref() {
                self.handle_text(message.chat.id, text).await;
            }
        }
    }

    async fn handle_text(&self, chat: SubscriberId, text: &str) {
        match text {
            "/start" => {
                self.persist(SubscriberSet::AllUsers, chat).await;
                self.persist(SubscriberSet::Started, chat).await;
                info!(chat = chat, "Chat started");
                self.messenger.send_message(chat, "🤖 Bot started\nUse /menu", None).await;
            }
            "/menu" => {
                self.messenger
                    .send_message(chat, "📋 *Main Menu*", Some(&main_menu()))
                    .await;
            }
            _ => {}
        }
    }

    pub async fn handle_action(&self, chat: SubscriberId, action: MenuAction) {
        match action {
            MenuAction::Status => {
                // Nothing to report before the first snapshot
                if let Some(text) = self.alerts.status_text() {
                    self.messenger.send_message(chat, &text, None).await;
                }
            }
            MenuAction::Subscribe(class) => {
                self.persist(class.set(), chat).await;
                let text = format!("✅ Subscribed to {} alerts", class.label());
                self.messenger.send_message(chat, &text, None).await;
            }
            MenuAction::Unsubscribe(class) => {
                self.registry.remove(class.set(), chat);
                let text = format!("❌ Unsubscribed from {} alerts", class.label());
                self.messenger.send_message(chat, &text, None).await;
            }
        }
    }

    async fn persist(&self, set: SubscriberSet, chat: SubscriberId) {
        if let Err(e) = self.registry.add(set, chat).await {
            warn!(set = ?set, chat = chat, error = %e, "Failed to persist subscriber");
        }
    }
}

/// Long-poll the Bot API forever, applying updates in order.
pub async fn run_command_loop(client: Arc<TelegramClient>, handler: CommandHandler) {
    let mut offset = 0i64;
    loop {
        match client.get_updates(offset).await {
            Ok(updates) => {
                for update in &updates {
                    offset = update.update_id + 1;
                    handler.handle_update(update).await;
                }
            }
            Err(e) => warn!(error = %e, "Polling for commands failed"),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
