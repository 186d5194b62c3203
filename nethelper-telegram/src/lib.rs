//! # nethelper-telegram
//!
//! Telegram transport for the network helper bot: converts teloxide updates into core
//! [`nethelper_core::Event`]s and implements [`nethelper_core::Bot`] and
//! [`nethelper_core::UpdateSource`] on top of a teloxide client.
//! No persistence or handler logic lives here.

mod adapters;
mod bot_adapter;
mod config;

pub use adapters::{event_from_update, TelegramUserWrapper};
pub use bot_adapter::{build_bot, TelegramBotAdapter};
pub use config::TelegramConfig;
