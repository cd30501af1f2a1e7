//! Homeguard Notifier - fans hub events out to chat subscribers.
//!
//! # Architecture
//!
//! ```text
//!        Hub (/api/ws)
//!             ↓
//! ┌─────────────────────────────────────────┐
//! │       AlertDispatcher                    │
//! │  - Vibration edge + 30 s cooldown        │
//! │  - Every access audit                    │
//! │  - Faces, 20 s cooldown per identity     │
//! └─────────────────────────────────────────┘
//!             ↓                 ↑ subscriptions
//! ┌──────────────────┐   ┌──────────────────┐
//! │  Messenger       │   │  CommandHandler  │
//! │  (Bot API sends) │   │  (long polling)  │
//! └──────────────────┘   └──────────────────┘
//!             ↓                 ↓
//!        SubscriberRegistry (append-only files)
//! ```

pub mod alerts;
pub mod commands;
pub mod subscribers;
pub mod telegram;

#[cfg(test)]
mod testing;

pub use alerts::{AlertDispatcher, AlertQueue};
pub use commands::{run_command_loop, CommandHandler};
pub use subscribers::{SubscriberId, SubscriberRegistry, SubscriberSet};
pub use telegram::{Messenger, TelegramClient};
