//! DNS conversation: pick a record type, enter a name (or an IPv4 address for PTR), get answers.
//!
//! `dns:start` / `dns:choose_type` show the type keyboard, `dns:type:<T>` stores the type and
//! enters `DNS_WAIT_TARGET`, `dns:repeat` re-prompts for the current type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use net_tools::{DnsProbe, DnsRecordType};
use nethelper_core::{
    Bot, Button, CallbackEvent, Event, EventKind, Handler, HandlerError, HandlerResponse, Keyboard,
    Reply, Result, Session, UserStore,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::format::{self, code};
use crate::reply::{
    acknowledge, callback_chat_id, edit_or_send, escape_html, menu_button, save_data, typing, Turn,
};
use crate::target::{validate_host, validate_public_ipv4, ValidationError};

pub const DNS_WAIT_TARGET: &str = "DNS_WAIT_TARGET";
pub const DNS_RUNNING: &str = "DNS_RUNNING";
pub const KEY_DNS_TYPE: &str = "dns_type";
pub const KEY_DNS_LAST_TARGET: &str = "dns_last_target";

const CB_PREFIX: &str = "dns:";
const CB_START: &str = "dns:start";
const CB_CHOOSE_TYPE: &str = "dns:choose_type";
const CB_TYPE_PREFIX: &str = "dns:type:";
const CB_REPEAT: &str = "dns:repeat";

const MSG_CHOOSE_TYPE: &str = "🔎 Choose a DNS record type:";
const MSG_BUSY: &str = "⏳ A DNS lookup is still running. Please wait…";

pub struct DnsHandler {
    pub(crate) bot: Arc<dyn Bot>,
    pub(crate) store: Arc<dyn UserStore>,
    pub(crate) probe: Arc<dyn DnsProbe>,
    pub(crate) timeout: Duration,
}

/// Record type stored in the session, A when absent or unknown.
fn session_type(session: &Session) -> DnsRecordType {
    session
        .data_str(KEY_DNS_TYPE)
        .map(DnsRecordType::parse_or_default)
        .unwrap_or(DnsRecordType::A)
}

fn validate_for(record_type: DnsRecordType, text: &str) -> std::result::Result<String, ValidationError> {
    match record_type {
        DnsRecordType::Ptr => validate_public_ipv4(text).map(|ip| ip.to_string()),
        _ => validate_host(text).map(|t| t.as_query()),
    }
}

impl DnsHandler {
    pub fn new(
        bot: Arc<dyn Bot>,
        store: Arc<dyn UserStore>,
        probe: Arc<dyn DnsProbe>,
        timeout: Duration,
    ) -> Self {
        Self {
            bot,
            store,
            probe,
            timeout,
        }
    }

    // ---------- Keyboards and prompts ----------

    pub(crate) fn type_keyboard() -> Keyboard {
        let button = |t: DnsRecordType| Button::callback(t.as_str(), format!("{}{}", CB_TYPE_PREFIX, t));
        Keyboard::new()
            .row(vec![
                button(DnsRecordType::A),
                button(DnsRecordType::Aaaa),
                button(DnsRecordType::Cname),
            ])
            .row(vec![
                button(DnsRecordType::Mx),
                button(DnsRecordType::Txt),
                button(DnsRecordType::Ns),
            ])
            .row(vec![button(DnsRecordType::Ptr)])
            .row(vec![menu_button()])
    }

    fn prompt_keyboard() -> Keyboard {
        Keyboard::new().row(vec![
            Button::callback("🔤 Change type", CB_CHOOSE_TYPE),
            menu_button(),
        ])
    }

    fn result_keyboard() -> Keyboard {
        Keyboard::new()
            .row(vec![
                Button::callback("🔁 Repeat", CB_REPEAT),
                Button::callback("🔤 Change type", CB_CHOOSE_TYPE),
            ])
            .row(vec![menu_button()])
    }

    fn prompt_text(record_type: DnsRecordType) -> String {
        match record_type {
            DnsRecordType::Ptr => {
                "🔎 <b>PTR</b>: enter a public IPv4 address, e.g. <code>8.8.8.8</code>".to_string()
            }
            t => format!(
                "🔎 <b>{}</b>: enter a domain name, e.g. <code>example.com</code>",
                t
            ),
        }
    }

    fn prompt(record_type: DnsRecordType) -> Reply {
        Reply::html(Self::prompt_text(record_type)).with_keyboard(Self::prompt_keyboard())
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
        let chat_id = callback_chat_id(callback);
        let turn = self.turn(user_id, chat_id);

        if session.in_state(&[DNS_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        let data = callback.data.as_str();
        if data == CB_START || data == CB_CHOOSE_TYPE {
            self.store.set_state(user_id, "").await?;
            save_data(self.store.as_ref(), user_id, &session.data, &[(KEY_DNS_TYPE, None)]).await?;
            let reply = Reply::text(MSG_CHOOSE_TYPE).with_keyboard(Self::type_keyboard());
            edit_or_send(self.bot.as_ref(), chat_id, callback.message, &reply).await?;
        } else if let Some(name) = data.strip_prefix(CB_TYPE_PREFIX) {
            let record_type = DnsRecordType::parse_or_default(name);
            debug!(user_id = user_id, record_type = %record_type, "step: dns type chosen");
            save_data(
                self.store.as_ref(),
                user_id,
                &session.data,
                &[(KEY_DNS_TYPE, Some(Value::String(record_type.to_string())))],
            )
            .await?;
            self.store.set_state(user_id, DNS_WAIT_TARGET).await?;
            edit_or_send(self.bot.as_ref(), chat_id, callback.message, &Self::prompt(record_type))
                .await?;
        } else if data == CB_REPEAT {
            turn.repeat_wait(DNS_WAIT_TARGET, &Self::prompt(session_type(session)))
                .await?;
        } else {
            debug!(user_id = user_id, data = data, "step: unknown dns callback ignored");
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
        if session.in_state(&[DNS_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        let record_type = session_type(session);
        let target = match validate_for(record_type, text) {
            Ok(target) => target,
            Err(e) => {
                debug!(user_id = user_id, reason = %e, "step: dns target rejected");
                let reply = Reply::html(format!(
                    "❌ Incorrect input: {}\n\n{}",
                    escape_html(&e.to_string()),
                    Self::prompt_text(record_type)
                ))
                .with_keyboard(Self::prompt_keyboard());
                return turn.reject(&reply).await;
            }
        };

        turn.run(
            session,
            &[
                (KEY_DNS_TYPE, Some(Value::String(record_type.to_string()))),
                (KEY_DNS_LAST_TARGET, Some(Value::String(target.clone()))),
            ],
            DNS_RUNNING,
            self.run_probe(user_id, chat_id, record_type, &target),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn run_probe(
        &self,
        user_id: i64,
        chat_id: i64,
        record_type: DnsRecordType,
        target: &str,
    ) -> Result<()> {
        typing(self.bot.as_ref(), chat_id).await;
        let placeholder = self
            .bot
            .send_reply(
                chat_id,
                &Reply::html(format!("⏳ DNS <b>{}</b> for {}…", record_type, code(target))),
            )
            .await?;

        let result = self.probe.lookup(target, record_type, self.timeout).await;
        info!(
            user_id = user_id,
            target = target,
            record_type = %record_type,
            ok = result.ok,
            answers = result.answers.len(),
            "step: dns lookup finished"
        );

        let reply = Reply::html(format::dns_result(&result)).with_keyboard(Self::result_keyboard());
        edit_or_send(self.bot.as_ref(), chat_id, Some(placeholder), &reply).await?;
        Ok(())
    }
}

#[async_trait]
impl Handler for DnsHandler {
    fn name(&self) -> &'static str {
        "DnsHandler"
    }

    fn can_handle(&self, event: &Event, session: &Session) -> bool {
        match &event.kind {
            EventKind::Callback(cb) => cb.data.starts_with(CB_PREFIX),
            EventKind::Message(_) => {
                event.user_id().is_some() && session.in_state(&[DNS_WAIT_TARGET, DNS_RUNNING])
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_keyboard_covers_every_record_type() {
        let keyboard = DnsHandler::type_keyboard();
        let payloads = keyboard.callback_payloads();
        for t in DnsRecordType::ALL {
            assert!(payloads.contains(&format!("dns:type:{}", t).as_str()), "{t}");
        }
        assert_eq!(payloads.last(), Some(&"menu"));
    }

    #[test]
    fn test_ptr_input_must_be_ipv4() {
        assert_eq!(validate_for(DnsRecordType::Ptr, "8.8.8.8").unwrap(), "8.8.8.8");
        assert_eq!(
            validate_for(DnsRecordType::Ptr, "example.com"),
            Err(ValidationError::NotIpv4)
        );
        assert_eq!(validate_for(DnsRecordType::Mx, "Example.com").unwrap(), "example.com");
    }

    #[test]
    fn test_session_type_defaults_to_a() {
        let mut session = Session::idle(1);
        assert_eq!(session_type(&session), DnsRecordType::A);
        session.data.insert(KEY_DNS_TYPE.to_string(), Value::String("mx".to_string()));
        assert_eq!(session_type(&session), DnsRecordType::Mx);
        session.data.insert(KEY_DNS_TYPE.to_string(), Value::String("SRV".to_string()));
        assert_eq!(session_type(&session), DnsRecordType::A);
    }
}
