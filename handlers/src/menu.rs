//! Menu / reset: `/start`, `/menu` or the `menu` button returns the user to idle.

use std::sync::Arc;

use async_trait::async_trait;
use nethelper_core::{
    Bot, Button, Event, EventKind, Handler, HandlerError, HandlerResponse, Keyboard, Reply, Result,
    Session, UserData, UserStore,
};
use tracing::{info, instrument};

use crate::reply::{acknowledge, callback_chat_id, edit_or_send, CB_MENU};

const MSG_MENU: &str = "Choose an action:";
const COMMANDS: [&str; 2] = ["/start", "/menu"];

/// Main menu keyboard: one entry point per probe.
pub fn main_menu() -> Reply {
    Reply::text(MSG_MENU).with_keyboard(
        Keyboard::new()
            .row(vec![Button::callback("📡 Ping", "ping:start")])
            .row(vec![Button::callback("🔎 DNS lookup", "dns:start")])
            .row(vec![Button::callback("❓ WHOIS", "whois:start")])
            .row(vec![Button::callback("🔐 TLS certificate", "tls:start")])
            .row(vec![Button::callback("🧭 My IP", "myip:start")]),
    )
}

/// `/start`, `/start@some_bot` and `/menu foo` are all menu commands.
pub(crate) fn is_menu_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or("");
    let command = command.split('@').next().unwrap_or("");
    COMMANDS.contains(&command)
}

pub struct MenuHandler {
    pub(crate) bot: Arc<dyn Bot>,
    pub(crate) store: Arc<dyn UserStore>,
}

impl MenuHandler {
    pub fn new(bot: Arc<dyn Bot>, store: Arc<dyn UserStore>) -> Self {
        Self { bot, store }
    }
}

#[async_trait]
impl Handler for MenuHandler {
    fn name(&self) -> &'static str {
        "MenuHandler"
    }

    /// Text commands yield to a running probe so its busy guard answers instead.
    fn can_handle(&self, event: &Event, session: &Session) -> bool {
        match &event.kind {
            EventKind::Callback(cb) => cb.data == CB_MENU,
            EventKind::Message(_) => {
                event.user_id().is_some()
                    && event.text().is_some_and(is_menu_command)
                    && !session.state.ends_with("_RUNNING")
            }
            EventKind::Unsupported(_) => false,
        }
    }

    #[instrument(skip(self, event, session), fields(update_id = event.sequence))]
    async fn handle(&self, event: &Event, session: &Session) -> Result<HandlerResponse> {
        let user_id = event.user_id().ok_or(HandlerError::NoUser)?;
        info!(user_id = user_id, state = %session.state, "step: resetting to menu");

        self.store.set_state(user_id, "").await?;
        self.store.set_data(user_id, &UserData::new()).await?;

        match &event.kind {
            EventKind::Callback(cb) => {
                acknowledge(self.bot.as_ref(), cb).await;
                edit_or_send(self.bot.as_ref(), callback_chat_id(cb), cb.message, &main_menu())
                    .await?;
            }
            _ => {
                let chat_id = event.chat_id().ok_or(HandlerError::NoChat)?;
                self.bot.send_reply(chat_id, &main_menu()).await?;
            }
        }
        Ok(HandlerResponse::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_commands() {
        assert!(is_menu_command("/start"));
        assert!(is_menu_command("  /menu now"));
        assert!(is_menu_command("/start@nethelper_bot"));
        assert!(!is_menu_command("/starter"));
        assert!(!is_menu_command("start"));
        assert!(!is_menu_command(""));
    }

    #[test]
    fn test_menu_lists_every_probe() {
        let keyboard = main_menu().keyboard.unwrap_or_default();
        assert_eq!(
            keyboard.callback_payloads(),
            vec!["ping:start", "dns:start", "whois:start", "tls:start", "myip:start"]
        );
    }
}
