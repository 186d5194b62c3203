//! WHOIS conversation: domain names go to the registry over port 43, IPv4 addresses to RDAP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use net_tools::WhoisProbe;
use nethelper_core::{
    Bot, CallbackEvent, Event, EventKind, Handler, HandlerError, HandlerResponse, Keyboard, Reply,
    Result, Session, UserStore,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::format::{self, code};
use crate::reply::{
    acknowledge, action_and_menu, callback_chat_id, edit_or_send, escape_html, typing, Turn,
};
use crate::target::validate_host;

pub const WHOIS_WAIT_TARGET: &str = "WHOIS_WAIT_TARGET";
pub const WHOIS_RUNNING: &str = "WHOIS_RUNNING";
pub const KEY_WHOIS_LAST_TARGET: &str = "whois_last_target";

const CB_PREFIX: &str = "whois:";
const CB_START: &str = "whois:start";
const CB_REPEAT: &str = "whois:repeat";

const MSG_PROMPT: &str = "❓ Enter a domain name (FQDN) or a public IPv4 address:";
const MSG_BUSY: &str = "⏳ A WHOIS query is still running. Please wait…";

pub struct WhoisHandler {
    pub(crate) bot: Arc<dyn Bot>,
    pub(crate) store: Arc<dyn UserStore>,
    pub(crate) probe: Arc<dyn WhoisProbe>,
    pub(crate) timeout: Duration,
}

impl WhoisHandler {
    pub fn new(
        bot: Arc<dyn Bot>,
        store: Arc<dyn UserStore>,
        probe: Arc<dyn WhoisProbe>,
        timeout: Duration,
    ) -> Self {
        Self {
            bot,
            store,
            probe,
            timeout,
        }
    }

    fn prompt_keyboard() -> Keyboard {
        action_and_menu("↩️ Start over", CB_START)
    }

    fn prompt(last_target: Option<&str>) -> Reply {
        let mut text = MSG_PROMPT.to_string();
        if let Some(last) = last_target {
            text.push_str(&format!("\nLast target: {}", code(last)));
        }
        Reply::html(text).with_keyboard(Self::prompt_keyboard())
    }

    fn turn(&self, user_id: i64, chat_id: i64) -> Turn<'_> {
        Turn {
            bot: self.bot.as_ref(),
            store: self.store.as_ref(),
            user_id,
            chat_id,
        }
    }

    async fn on_callback(
        &self,
        user_id: i64,
        callback: &CallbackEvent,
        session: &Session,
    ) -> Result<HandlerResponse> {
        acknowledge(self.bot.as_ref(), callback).await;
        let turn = self.turn(user_id, callback_chat_id(callback));

        if session.in_state(&[WHOIS_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        match callback.data.as_str() {
            CB_START => {
                turn.begin_wait(
                    session,
                    WHOIS_WAIT_TARGET,
                    &[KEY_WHOIS_LAST_TARGET],
                    callback.message,
                    &Self::prompt(None),
                )
                .await?
            }
            CB_REPEAT => {
                let prompt = Self::prompt(session.data_str(KEY_WHOIS_LAST_TARGET));
                turn.repeat_wait(WHOIS_WAIT_TARGET, &prompt).await?
            }
            other => debug!(user_id = user_id, data = other, "step: unknown whois callback ignored"),
        }
        Ok(HandlerResponse::Stop)
    }

    async fn on_text(
        &self,
        user_id: i64,
        chat_id: i64,
        text: &str,
        session: &Session,
    ) -> Result<HandlerResponse> {
        let turn = self.turn(user_id, chat_id);
        if session.in_state(&[WHOIS_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        let target = match validate_host(text) {
            Ok(target) => target.as_query(),
            Err(e) => {
                debug!(user_id = user_id, reason = %e, "step: whois target rejected");
                let reply = Reply::html(format!(
                    "❌ Incorrect input: {}\n\n{}",
                    escape_html(&e.to_string()),
                    MSG_PROMPT
                ))
                .with_keyboard(Self::prompt_keyboard());
                return turn.reject(&reply).await;
            }
        };

        turn.run(
            session,
            &[(KEY_WHOIS_LAST_TARGET, Some(Value::String(target.clone())))],
            WHOIS_RUNNING,
            self.run_probe(user_id, chat_id, &target),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn run_probe(&self, user_id: i64, chat_id: i64, target: &str) -> Result<()> {
        typing(self.bot.as_ref(), chat_id).await;
        let placeholder = self
            .bot
            .send_reply(chat_id, &Reply::html(format!("⏳ WHOIS for {}…", code(target))))
            .await?;

        let result = self.probe.whois(target, self.timeout).await;
        info!(
            user_id = user_id,
            target = target,
            kind = ?result.kind,
            ok = result.ok,
            "step: whois finished"
        );

        let reply = Reply::html(format::whois_result(&result))
            .with_keyboard(action_and_menu("🔁 Repeat", CB_REPEAT));
        edit_or_send(self.bot.as_ref(), chat_id, Some(placeholder), &reply).await?;
        Ok(())
    }
}

#[async_trait]
impl Handler for WhoisHandler {
    fn name(&self) -> &'static str {
        "WhoisHandler"
    }

    fn can_handle(&self, event: &Event, session: &Session) -> bool {
        match &event.kind {
            EventKind::Callback(cb) => cb.data.starts_with(CB_PREFIX),
            EventKind::Message(_) => {
                event.user_id().is_some()
                    && session.in_state(&[WHOIS_WAIT_TARGET, WHOIS_RUNNING])
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
