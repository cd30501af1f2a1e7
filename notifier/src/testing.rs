use crate::subscribers::SubscriberId;
use crate::telegram::{InlineKeyboard, Messenger};
use async_trait::async_trait;
use homeguard::hub_client::Delivery;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message(SubscriberId, String),
    Menu(SubscriberId, String, InlineKeyboard),
    Photo(SubscriberId, String, String),
    Location(SubscriberId),
}

/// Messenger that records every send
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    /// Drain everything sent so far
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    fn push(&self, sent: Sent) -> Delivery {
        self.sent.lock().unwrap().push(sent);
        Delivery::Delivered
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat: SubscriberId, text: &str, keyboard: Option<&InlineKeyboard>) -> Delivery {
        match keyboard {
            Some(keyboard) => self.push(Sent::Menu(chat, text.to_string(), keyboard.clone())),
            None => self.push(Sent::Message(chat, text.to_string())),
        }
    }

    async fn send_photo(&self, chat: SubscriberId, photo_url: &str, caption: &str) -> Delivery {
        self.push(Sent::Photo(chat, photo_url.to_string(), caption.to_string()))
    }

    async fn send_location(&self, chat: SubscriberId, _latitude: f64, _longitude: f64) -> Delivery {
        self.push(Sent::Location(chat))
    }
}
