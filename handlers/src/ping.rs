//! Ping conversation: prompt for a target, validate it, run the ICMP probe, report.
//!
//! States: idle → `PING_WAIT_TARGET` (after `ping:start` / `ping:repeat`) → `PING_RUNNING`
//! (valid target received) → idle (result sent). Invalid input re-prompts and stays in
//! `PING_WAIT_TARGET`; text received while `PING_RUNNING` gets the busy notice.

use std::sync::Arc;

use async_trait::async_trait;
use net_tools::{PingOptions, PingProbe};
use nethelper_core::{
    Bot, CallbackEvent, Event, EventKind, Handler, HandlerError, HandlerResponse, Keyboard,
    Reply, Result, Session, UserStore,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::format::{self, code};
use crate::reply::{
    acknowledge, action_and_menu, callback_chat_id, edit_or_send, escape_html, menu_button, typing,
    Turn,
};
use crate::target::validate_host;

pub const PING_WAIT_TARGET: &str = "PING_WAIT_TARGET";
pub const PING_RUNNING: &str = "PING_RUNNING";
pub const KEY_PING_LAST_TARGET: &str = "ping_last_target";

const CB_PREFIX: &str = "ping:";
const CB_START: &str = "ping:start";
const CB_REPEAT: &str = "ping:repeat";

const MSG_PROMPT: &str = "📡 Enter a public IPv4 address or domain name:";
const MSG_BUSY: &str = "⏳ A ping is still running. Please wait…";
const MSG_EXAMPLE: &str = "Example: <code>8.8.8.8</code> or <code>example.com</code>";

pub struct PingHandler {
    pub(crate) bot: Arc<dyn Bot>,
    pub(crate) store: Arc<dyn UserStore>,
    pub(crate) probe: Arc<dyn PingProbe>,
    pub(crate) options: PingOptions,
}

impl PingHandler {
    pub fn new(
        bot: Arc<dyn Bot>,
        store: Arc<dyn UserStore>,
        probe: Arc<dyn PingProbe>,
        options: PingOptions,
    ) -> Self {
        Self {
            bot,
            store,
            probe,
            options,
        }
    }

    // ---------- Replies ----------

    fn prompt(last_target: Option<&str>) -> Reply {
        let mut text = MSG_PROMPT.to_string();
        if let Some(last) = last_target {
            text.push_str(&format!("\nLast target: {}", code(last)));
        }
        Reply::html(text).with_keyboard(Keyboard::new().row(vec![menu_button()]))
    }

    fn result_keyboard() -> Keyboard {
        action_and_menu("🔁 Ping again", CB_REPEAT)
    }

    fn turn(&self, user_id: i64, chat_id: i64) -> Turn<'_> {
        Turn {
            bot: self.bot.as_ref(),
            store: self.store.as_ref(),
            user_id,
            chat_id,
        }
    }

    // ---------- Callbacks ----------

    async fn on_callback(
        &self,
        user_id: i64,
        callback: &CallbackEvent,
        session: &Session,
    ) -> Result<HandlerResponse> {
        acknowledge(self.bot.as_ref(), callback).await;
        let turn = self.turn(user_id, callback_chat_id(callback));

        if session.in_state(&[PING_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        match callback.data.as_str() {
            CB_START => {
                turn.begin_wait(
                    session,
                    PING_WAIT_TARGET,
                    &[KEY_PING_LAST_TARGET],
                    callback.message,
                    &Self::prompt(None),
                )
                .await?
            }
            CB_REPEAT => {
                let prompt = Self::prompt(session.data_str(KEY_PING_LAST_TARGET));
                turn.repeat_wait(PING_WAIT_TARGET, &prompt).await?
            }
            other => debug!(user_id = user_id, data = other, "step: unknown ping callback ignored"),
        }
        Ok(HandlerResponse::Stop)
    }

    // ---------- Free text ----------

    async fn on_text(
        &self,
        user_id: i64,
        chat_id: i64,
        text: &str,
        session: &Session,
    ) -> Result<HandlerResponse> {
        let turn = self.turn(user_id, chat_id);
        if session.in_state(&[PING_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        let target = match validate_host(text) {
            Ok(target) => target.as_query(),
            Err(e) => {
                debug!(user_id = user_id, reason = %e, "step: ping target rejected");
                let reply = Reply::html(format!(
                    "❌ Incorrect address: {}\n{}",
                    escape_html(&e.to_string()),
                    MSG_EXAMPLE
                ))
                .with_keyboard(Keyboard::new().row(vec![menu_button()]));
                return turn.reject(&reply).await;
            }
        };

        turn.run(
            session,
            &[(KEY_PING_LAST_TARGET, Some(Value::String(target.clone())))],
            PING_RUNNING,
            self.run_probe(user_id, chat_id, &target),
        )
        .await
    }

    #[instrument(skip(self), fields(count = self.options.count))]
    async fn run_probe(&self, user_id: i64, chat_id: i64, target: &str) -> Result<()> {
        typing(self.bot.as_ref(), chat_id).await;
        let placeholder = self
            .bot
            .send_reply(chat_id, &Reply::html(format!("⏳ Pinging {}…", code(target))))
            .await?;

        let result = self.probe.ping(target, self.options).await;
        info!(
            user_id = user_id,
            target = target,
            ok = result.ok,
            received = result.received,
            "step: ping finished"
        );

        let reply = Reply::html(format::ping_result(target, self.options.count, &result))
            .with_keyboard(Self::result_keyboard());
        edit_or_send(self.bot.as_ref(), chat_id, Some(placeholder), &reply).await?;
        Ok(())
    }
}

#[async_trait]
impl Handler for PingHandler {
    fn name(&self) -> &'static str {
        "PingHandler"
    }

    fn can_handle(&self, event: &Event, session: &Session) -> bool {
        match &event.kind {
            EventKind::Callback(cb) => cb.data.starts_with(CB_PREFIX),
            EventKind::Message(_) => {
                event.user_id().is_some() && session.in_state(&[PING_WAIT_TARGET, PING_RUNNING])
            }
            EventKind::Unsupported(_) => false,
        }
    }

    #[instrument(skip(self, event, session), fields(update_id = event.sequence, state = %session.state))]
    async fn handle(&self, event: &Event, session: &Session) -> Result<HandlerResponse> {
        let user_id = event.user_id().ok_or(HandlerError::NoUser)?;
        match &event.kind {
            EventKind::Callback(cb) => self.on_callback(user_id, cb, session).await,
            EventKind::Message(_) => {
                let chat_id = event.chat_id().ok_or(HandlerError::NoChat)?;
                self.on_text(user_id, chat_id, event.text().unwrap_or(""), session)
                    .await
            }
            EventKind::Unsupported(name) => {
                Err(HandlerError::UnexpectedEvent(name.clone()).into())
            }
        }
    }
}
