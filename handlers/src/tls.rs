//! TLS conversation: `host[:port]` in, certificate and session summary out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use net_tools::TlsProbe;
use nethelper_core::{
    Bot, CallbackEvent, Event, EventKind, Handler, HandlerError, HandlerResponse, Keyboard, Reply,
    Result, Session, UserStore,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::format::{self, code};
use crate::reply::{
    acknowledge, action_and_menu, callback_chat_id, edit_or_send, escape_html, menu_button, typing,
    Turn,
};
use crate::target::parse_tls_target;

pub const TLS_WAIT_TARGET: &str = "TLS_WAIT_TARGET";
pub const TLS_RUNNING: &str = "TLS_RUNNING";
pub const KEY_TLS_LAST_HOST: &str = "tls_last_host";
pub const KEY_TLS_LAST_PORT: &str = "tls_last_port";

const CB_PREFIX: &str = "tls:";
const CB_START: &str = "tls:start";
const CB_REPEAT: &str = "tls:repeat";

const MSG_PROMPT: &str = "🔐 Enter <code>host[:port]</code> (default port 443):";
const MSG_BUSY: &str = "⏳ A TLS check is still running. Please wait…";
const MSG_EXAMPLE: &str = "Example: <code>example.com</code> or <code>example.com:8443</code>";

pub struct TlsHandler {
    pub(crate) bot: Arc<dyn Bot>,
    pub(crate) store: Arc<dyn UserStore>,
    pub(crate) probe: Arc<dyn TlsProbe>,
    pub(crate) timeout: Duration,
}

impl TlsHandler {
    pub fn new(
        bot: Arc<dyn Bot>,
        store: Arc<dyn UserStore>,
        probe: Arc<dyn TlsProbe>,
        timeout: Duration,
    ) -> Self {
        Self {
            bot,
            store,
            probe,
            timeout,
        }
    }

    fn prompt(session: Option<&Session>) -> Reply {
        let mut text = MSG_PROMPT.to_string();
        if let Some(host) = session.and_then(|s| s.data_str(KEY_TLS_LAST_HOST)) {
            let port = session
                .and_then(|s| s.data.get(KEY_TLS_LAST_PORT))
                .and_then(Value::as_u64)
                .unwrap_or(443);
            text.push_str(&format!("\nLast target: {}", code(&format!("{}:{}", host, port))));
        }
        Reply::html(text).with_keyboard(Keyboard::new().row(vec![menu_button()]))
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

        if session.in_state(&[TLS_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        match callback.data.as_str() {
            CB_START => {
                turn.begin_wait(
                    session,
                    TLS_WAIT_TARGET,
                    &[KEY_TLS_LAST_HOST, KEY_TLS_LAST_PORT],
                    callback.message,
                    &Self::prompt(None),
                )
                .await?
            }
            CB_REPEAT => {
                turn.repeat_wait(TLS_WAIT_TARGET, &Self::prompt(Some(session)))
                    .await?
            }
            other => debug!(user_id = user_id, data = other, "step: unknown tls callback ignored"),
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
        if session.in_state(&[TLS_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        let (host, port) = match parse_tls_target(text) {
            Ok((target, port)) => (target.as_query(), port),
            Err(e) => {
                debug!(user_id = user_id, reason = %e, "step: tls target rejected");
                let reply = Reply::html(format!(
                    "❌ Incorrect input: {}\n{}",
                    escape_html(&e.to_string()),
                    MSG_EXAMPLE
                ))
                .with_keyboard(Keyboard::new().row(vec![menu_button()]));
                return turn.reject(&reply).await;
            }
        };

        turn.run(
            session,
            &[
                (KEY_TLS_LAST_HOST, Some(Value::String(host.clone()))),
                (KEY_TLS_LAST_PORT, Some(Value::from(port))),
            ],
            TLS_RUNNING,
            self.run_probe(user_id, chat_id, &host, port),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn run_probe(&self, user_id: i64, chat_id: i64, host: &str, port: u16) -> Result<()> {
        typing(self.bot.as_ref(), chat_id).await;
        let placeholder = self
            .bot
            .send_reply(
                chat_id,
                &Reply::html(format!(
                    "⏳ TLS handshake with {}…",
                    code(&format!("{}:{}", host, port))
                )),
            )
            .await?;

        let info = self.probe.inspect(host, port, self.timeout).await;
        info!(
            user_id = user_id,
            host = host,
            port = port,
            ok = info.ok,
            protocol = ?info.protocol,
            "step: tls inspection finished"
        );

        let reply = Reply::html(format::tls_result(&info))
            .with_keyboard(action_and_menu("🔁 Check another", CB_REPEAT));
        edit_or_send(self.bot.as_ref(), chat_id, Some(placeholder), &reply).await?;
        Ok(())
    }
}

#[async_trait]
impl Handler for TlsHandler {
    fn name(&self) -> &'static str {
        "TlsHandler"
    }

    fn can_handle(&self, event: &Event, session: &Session) -> bool {
        match &event.kind {
            EventKind::Callback(cb) => cb.data.starts_with(CB_PREFIX),
            EventKind::Message(_) => {
                event.user_id().is_some() && session.in_state(&[TLS_WAIT_TARGET, TLS_RUNNING])
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
