//! External IP discovery: no target to ask for, the button goes straight to `MYIP_RUNNING`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use net_tools::IpDiscovery;
use nethelper_core::{
    Bot, Event, EventKind, Handler, HandlerError, HandlerResponse, MessageRef, Reply, Result,
    Session, UserStore,
};
use tracing::{debug, info, instrument};

use crate::format;
use crate::reply::{acknowledge, action_and_menu, callback_chat_id, edit_or_send, typing, Turn};

pub const MYIP_RUNNING: &str = "MYIP_RUNNING";

const CB_PREFIX: &str = "myip:";
const CB_START: &str = "myip:start";
const CB_REPEAT: &str = "myip:repeat";

const MSG_PLACEHOLDER: &str = "⏳ Detecting the external IP…";
const MSG_BUSY: &str = "⏳ IP detection is still running. Please wait…";

pub struct MyIpHandler {
    pub(crate) bot: Arc<dyn Bot>,
    pub(crate) store: Arc<dyn UserStore>,
    pub(crate) discovery: Arc<dyn IpDiscovery>,
    pub(crate) timeout: Duration,
}

impl MyIpHandler {
    pub fn new(
        bot: Arc<dyn Bot>,
        store: Arc<dyn UserStore>,
        discovery: Arc<dyn IpDiscovery>,
        timeout: Duration,
    ) -> Self {
        Self {
            bot,
            store,
            discovery,
            timeout,
        }
    }

    fn turn(&self, user_id: i64, chat_id: i64) -> Turn<'_> {
        Turn {
            bot: self.bot.as_ref(),
            store: self.store.as_ref(),
            user_id,
            chat_id,
        }
    }

    #[instrument(skip(self, message))]
    async fn run_probe(&self, user_id: i64, chat_id: i64, message: Option<MessageRef>) -> Result<()> {
        typing(self.bot.as_ref(), chat_id).await;
        let placeholder = edit_or_send(
            self.bot.as_ref(),
            chat_id,
            message,
            &Reply::text(MSG_PLACEHOLDER),
        )
        .await?;

        let result = self.discovery.discover(self.timeout).await;
        info!(
            user_id = user_id,
            ok = result.ok,
            source = ?result.source,
            "step: ip discovery finished"
        );

        let reply = Reply::html(format::myip_result(&result))
            .with_keyboard(action_and_menu("🔁 Check again", CB_REPEAT));
        edit_or_send(self.bot.as_ref(), chat_id, Some(placeholder), &reply).await?;
        Ok(())
    }
}

#[async_trait]
impl Handler for MyIpHandler {
    fn name(&self) -> &'static str {
        "MyIpHandler"
    }

    fn can_handle(&self, event: &Event, session: &Session) -> bool {
        match &event.kind {
            EventKind::Callback(cb) => cb.data.starts_with(CB_PREFIX),
            EventKind::Message(_) => event.user_id().is_some() && session.in_state(&[MYIP_RUNNING]),
            EventKind::Unsupported(_) => false,
        }
    }

    #[instrument(skip(self, event, session), fields(update_id = event.sequence, state = %session.state))]
    async fn handle(&self, event: &Event, session: &Session) -> Result<HandlerResponse> {
        let user_id = event.user_id().ok_or(HandlerError::NoUser)?;

        let callback = match &event.kind {
            EventKind::Callback(cb) => cb,
            EventKind::Message(_) => {
                // Only reachable while MYIP_RUNNING.
                let chat_id = event.chat_id().ok_or(HandlerError::NoChat)?;
                return self.turn(user_id, chat_id).busy(MSG_BUSY).await;
            }
            EventKind::Unsupported(name) => {
                return Err(HandlerError::UnexpectedEvent(name.clone()).into())
            }
        };

        acknowledge(self.bot.as_ref(), callback).await;
        let chat_id = callback_chat_id(callback);
        let turn = self.turn(user_id, chat_id);

        if session.in_state(&[MYIP_RUNNING]) {
            return turn.busy(MSG_BUSY).await;
        }

        match callback.data.as_str() {
            CB_START | CB_REPEAT => {
                turn.run(
                    session,
                    &[],
                    MYIP_RUNNING,
                    self.run_probe(user_id, chat_id, callback.message),
                )
                .await
            }
            other => {
                debug!(user_id = user_id, data = other, "step: unknown myip callback ignored");
                Ok(HandlerResponse::Stop)
            }
        }
    }
}
