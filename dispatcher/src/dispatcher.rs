//! Ordered handler chain with a per-handler failure boundary.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use nethelper_core::{
    BotError, Event, Handler, HandlerError, HandlerResponse, Result, Session, UserStore,
};
use tracing::{debug, error, info, instrument, warn};

/// How one dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every matching handler returned Continue (or none matched).
    Completed,
    /// The named handler returned Stop.
    Stopped(&'static str),
    /// The named handler failed or panicked; later handlers were skipped.
    Faulted(&'static str),
    /// The acting user's session could not be loaded; no handler ran.
    Abandoned,
}

/// Fixed, ordered list of handlers plus the store sessions are read from.
///
/// Session semantics: loaded once before the chain and re-read after every handler that returned
/// Continue, so later handlers always see what earlier ones persisted.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn UserStore>,
    handlers: Vec<Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            handlers: Vec::new(),
        }
    }

    /// Appends a handler; order of calls is chain order.
    pub fn add_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn add_handlers(mut self, handlers: impl IntoIterator<Item = Arc<dyn Handler>>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Runs the chain for one event. Never returns an error: faults are logged and reported in the
    /// outcome so the caller can move on to the next event.
    #[instrument(skip(self, event), fields(update_id = event.sequence, kind = %event.kind_name()))]
    pub async fn dispatch(&self, event: &Event) -> DispatchOutcome {
        let user_id = event.user_id();
        info!(
            update_id = event.sequence,
            user_id = ?user_id,
            chat_id = ?event.chat_id(),
            "step: dispatch started"
        );

        let mut session = match self.load_session(user_id).await {
            Ok(session) => session,
            Err(e) => {
                error!(
                    update_id = event.sequence,
                    user_id = ?user_id,
                    error = %e,
                    "step: session load failed, event abandoned"
                );
                return DispatchOutcome::Abandoned;
            }
        };

        for handler in &self.handlers {
            let handler_name = handler.name();
            if !handler.can_handle(event, &session) {
                debug!(handler = %handler_name, "Handler skipped");
                continue;
            }

            info!(
                user_id = ?user_id,
                handler = %handler_name,
                state = %session.state,
                "step: handler processing"
            );

            match guarded_handle(handler.as_ref(), event, &session).await {
                Ok(HandlerResponse::Continue) => {
                    info!(
                        user_id = ?user_id,
                        handler = %handler_name,
                        response_type = "Continue",
                        "step: handler done"
                    );
                }
                Ok(HandlerResponse::Stop) => {
                    info!(
                        user_id = ?user_id,
                        handler = %handler_name,
                        response_type = "Stop",
                        "step: handler chain stopped by handler"
                    );
                    return DispatchOutcome::Stopped(handler_name);
                }
                Err(e) => {
                    error!(
                        update_id = event.sequence,
                        user_id = ?user_id,
                        handler = %handler_name,
                        error = %e,
                        "step: handler failed, chain stopped"
                    );
                    return DispatchOutcome::Faulted(handler_name);
                }
            }

            session = match self.load_session(user_id).await {
                Ok(session) => session,
                Err(e) => {
                    error!(
                        update_id = event.sequence,
                        user_id = ?user_id,
                        handler = %handler_name,
                        error = %e,
                        "step: session reload failed, chain stopped"
                    );
                    return DispatchOutcome::Faulted(handler_name);
                }
            };
        }

        info!(update_id = event.sequence, user_id = ?user_id, "step: dispatch finished");
        DispatchOutcome::Completed
    }

    async fn load_session(&self, user_id: Option<i64>) -> Result<Session> {
        let Some(user_id) = user_id else {
            return Ok(Session::anonymous());
        };
        Ok(match self.store.get_user(user_id).await? {
            Some(record) => Session::from_record(record),
            None => Session::idle(user_id),
        })
    }
}

/// Runs `handle` so that a panic becomes an ordinary fault.
async fn guarded_handle(
    handler: &dyn Handler,
    event: &Event,
    session: &Session,
) -> Result<HandlerResponse> {
    match AssertUnwindSafe(handler.handle(event, session))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(handler = %handler.name(), panic = %message, "Handler panicked");
            Err(BotError::Handler(HandlerError::Panicked(message)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
