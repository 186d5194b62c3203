//! Reply plumbing shared by the handlers: HTML escaping, edit-with-fallback, callback targets.

use std::future::Future;

use nethelper_core::{
    Bot, Button, CallbackEvent, HandlerResponse, Keyboard, MessageRef, Reply, Result, Session,
    UserData, UserStore,
};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const CB_MENU: &str = "menu";

/// Escapes `&`, `<` and `>` for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn menu_button() -> Button {
    Button::callback("🏠 Menu", CB_MENU)
}

/// `[label → payload] [Menu]` in one row.
pub(crate) fn action_and_menu(label: &str, payload: &str) -> Keyboard {
    Keyboard::new().row(vec![Button::callback(label, payload), menu_button()])
}

/// Chat a callback answer goes to. Falls back to the sender's private chat when the
/// originating message is no longer addressable.
pub(crate) fn callback_chat_id(callback: &CallbackEvent) -> i64 {
    callback
        .message
        .map(|m| m.chat_id)
        .unwrap_or(callback.from.id)
}

/// Edits `message` in place; sends `reply` as a new message when there is nothing to edit,
/// the edit was a no-op, or the message is gone. Returns the message now showing `reply`.
pub(crate) async fn edit_or_send(
    bot: &dyn Bot,
    chat_id: i64,
    message: Option<MessageRef>,
    reply: &Reply,
) -> Result<MessageRef> {
    if let Some(message) = message {
        let outcome = bot.edit_reply(message, reply).await?;
        if outcome.is_edited() {
            return Ok(message);
        }
        debug!(
            chat_id = chat_id,
            message_id = message.message_id,
            outcome = ?outcome,
            "step: edit not applied, sending new message"
        );
    }
    bot.send_reply(chat_id, reply).await
}

/// Acknowledges a callback. A failed acknowledgement only costs the client its spinner.
pub(crate) async fn acknowledge(bot: &dyn Bot, callback: &CallbackEvent) {
    if let Err(e) = bot.acknowledge_callback(&callback.id).await {
        warn!(error = %e, callback_id = %callback.id, "step: callback acknowledgement failed");
    }
}

/// Typing indicator before a probe; failure is logged and ignored.
pub(crate) async fn typing(bot: &dyn Bot, chat_id: i64) {
    if let Err(e) = bot.send_typing(chat_id).await {
        warn!(error = %e, chat_id = chat_id, "step: typing indicator failed");
    }
}

/// Persists `data` with `entries` applied. `None` removes the key.
pub(crate) async fn save_data(
    store: &dyn UserStore,
    user_id: i64,
    data: &UserData,
    entries: &[(&str, Option<Value>)],
) -> Result<()> {
    let mut data = data.clone();
    for (key, value) in entries {
        match value {
            Some(value) => {
                data.insert((*key).to_string(), value.clone());
            }
            None => {
                data.remove(*key);
            }
        }
    }
    store.set_data(user_id, &data).await
}

// ---------- Conversation steps ----------

/// One user's turn in a probe conversation: who is talking, where answers go, and the
/// collaborators every step needs.
pub(crate) struct Turn<'a> {
    pub bot: &'a dyn Bot,
    pub store: &'a dyn UserStore,
    pub user_id: i64,
    pub chat_id: i64,
}

impl<'a> Turn<'a> {
    /// Busy notice for input that arrives while a probe runs. State is left alone.
    pub async fn busy(&self, notice: &str) -> Result<HandlerResponse> {
        info!(user_id = self.user_id, "step: probe busy, input ignored");
        self.bot.send_reply(self.chat_id, &Reply::text(notice)).await?;
        Ok(HandlerResponse::Stop)
    }

    /// `*:start`: enters `wait_state`, drops the handler's own `keys` and shows `prompt` in
    /// place of the pressed message.
    pub async fn begin_wait(
        &self,
        session: &Session,
        wait_state: &str,
        keys: &[&str],
        message: Option<MessageRef>,
        prompt: &Reply,
    ) -> Result<()> {
        self.store.set_state(self.user_id, wait_state).await?;
        let cleared: Vec<(&str, Option<Value>)> = keys.iter().map(|k| (*k, None)).collect();
        save_data(self.store, self.user_id, &session.data, &cleared).await?;
        edit_or_send(self.bot, self.chat_id, message, prompt).await?;
        Ok(())
    }

    /// `*:repeat`: re-enters `wait_state` and sends `prompt` as a new message so the previous
    /// result stays on screen.
    pub async fn repeat_wait(&self, wait_state: &str, prompt: &Reply) -> Result<()> {
        self.store.set_state(self.user_id, wait_state).await?;
        self.bot.send_reply(self.chat_id, prompt).await?;
        Ok(())
    }

    /// Rejected input: explain and stay in the current wait state.
    pub async fn reject(&self, reply: &Reply) -> Result<HandlerResponse> {
        self.bot.send_reply(self.chat_id, reply).await?;
        Ok(HandlerResponse::Stop)
    }

    /// Saves `remember`, marks the user `running_state` and awaits `probe`. The user is back
    /// to idle afterwards whether or not `probe` failed; its error is returned after the reset.
    pub async fn run<F>(
        &self,
        session: &Session,
        remember: &[(&str, Option<Value>)],
        running_state: &str,
        probe: F,
    ) -> Result<HandlerResponse>
    where
        F: Future<Output = Result<()>>,
    {
        if !remember.is_empty() {
            save_data(self.store, self.user_id, &session.data, remember).await?;
        }
        self.store.set_state(self.user_id, running_state).await?;

        let outcome = probe.await;
        self.store.set_state(self.user_id, "").await?;
        if let Err(e) = &outcome {
            warn!(user_id = self.user_id, error = %e, state = running_state, "step: probe step failed, user reset to idle");
        }
        outcome.map(|_| HandlerResponse::Stop)
    }
}
