//! Wraps teloxide::Bot and implements [`nethelper_core::Bot`] and [`nethelper_core::UpdateSource`].
//! Production code talks to Telegram through this; tests substitute recording fakes.

use std::time::Duration;

use async_trait::async_trait;
use nethelper_core::{
    Bot as CoreBot, BotError, EditOutcome, Event, Keyboard, MessageRef, ParseMode as CoreParseMode,
    Reply, Result, UpdateSource,
};
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId,
    ParseMode,
};
use teloxide::{ApiError, RequestError};
use tracing::{debug, instrument};

use crate::adapters::event_from_update;
use crate::config::TelegramConfig;

/// Builds a teloxide client whose HTTP timeout outlasts the long-poll wait.
pub fn build_bot(config: &TelegramConfig) -> anyhow::Result<teloxide::Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(config.http_timeout())
        .build()?;
    let mut bot = teloxide::Bot::with_client(config.bot_token.clone(), client);
    if let Some(url) = &config.telegram_api_url {
        bot = bot.set_api_url(reqwest::Url::parse(url)?);
    }
    Ok(bot)
}

fn transport(e: RequestError) -> BotError {
    BotError::Transport(e.to_string())
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.callback_data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn parse_mode(mode: CoreParseMode) -> ParseMode {
    match mode {
        CoreParseMode::Html => ParseMode::Html,
    }
}

/// Thin wrapper around teloxide::Bot.
#[derive(Clone)]
pub struct TelegramBotAdapter {
    bot: teloxide::Bot,
}

impl TelegramBotAdapter {
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl CoreBot for TelegramBotAdapter {
    async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<MessageRef> {
        let mut request = self.bot.send_message(ChatId(chat_id), reply.text.clone());
        if let Some(mode) = reply.parse_mode {
            request = request.parse_mode(parse_mode(mode));
        }
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(markup(keyboard));
        }
        let sent = request.await.map_err(transport)?;
        Ok(MessageRef {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn edit_reply(&self, message: MessageRef, reply: &Reply) -> Result<EditOutcome> {
        let mut request = self.bot.edit_message_text(
            ChatId(message.chat_id),
            MessageId(message.message_id),
            reply.text.clone(),
        );
        if let Some(mode) = reply.parse_mode {
            request = request.parse_mode(parse_mode(mode));
        }
        if let Some(keyboard) = &reply.keyboard {
            request = request.reply_markup(markup(keyboard));
        }

        match request.await {
            Ok(_) => Ok(EditOutcome::Edited),
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(EditOutcome::NotModified),
            Err(RequestError::Api(
                ApiError::MessageToEditNotFound | ApiError::MessageCantBeEdited,
            )) => {
                debug!(
                    chat_id = message.chat_id,
                    message_id = message.message_id,
                    "step: message to edit is gone"
                );
                Ok(EditOutcome::MessageGone)
            }
            Err(e) => Err(transport(e)),
        }
    }

    async fn acknowledge_callback(&self, callback_id: &str) -> Result<()> {
        self.bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()))
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map_err(transport)?;
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramBotAdapter {
    /// `getUpdates(offset = cursor, timeout = wait, limit)`; every update comes back as an event.
    #[instrument(skip(self))]
    async fn fetch(&self, cursor: i64, wait: Duration, limit: u8) -> Result<Vec<Event>> {
        let offset = i32::try_from(cursor)
            .map_err(|_| BotError::Transport(format!("cursor {} out of range", cursor)))?;
        let timeout = u32::try_from(wait.as_secs()).unwrap_or(u32::MAX);

        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(timeout)
            .limit(limit)
            .await
            .map_err(transport)?;

        debug!(count = updates.len(), cursor = cursor, "step: updates fetched");
        Ok(updates.iter().map(event_from_update).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nethelper_core::Button;

    #[test]
    fn test_markup_keeps_rows_and_payloads() {
        let keyboard = Keyboard::new()
            .row(vec![Button::callback("A", "dns:type:A"), Button::callback("MX", "dns:type:MX")])
            .row(vec![Button::callback("Menu", "menu")]);

        let markup = markup(&keyboard);

        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "Menu");
    }

    #[test]
    fn test_build_bot_rejects_bad_api_url() {
        let mut config = TelegramConfig::with_token("123:abc".to_string());
        config.telegram_api_url = Some("not a url".to_string());
        assert!(build_bot(&config).is_err());
    }
}
