//! Makes sure every identifiable user has a persisted row before stateful handlers run.

use std::sync::Arc;

use async_trait::async_trait;
use nethelper_core::{Event, Handler, HandlerError, HandlerResponse, Result, Session, UserStore};
use tracing::{debug, instrument};

/// Creates the user row on first contact. Never touches an existing row.
pub struct UserProvisioner {
    pub(crate) store: Arc<dyn UserStore>,
}

impl UserProvisioner {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for UserProvisioner {
    fn name(&self) -> &'static str {
        "UserProvisioner"
    }

    fn can_handle(&self, event: &Event, _session: &Session) -> bool {
        event.user_id().is_some()
    }

    #[instrument(skip(self, event, _session), fields(update_id = event.sequence))]
    async fn handle(&self, event: &Event, _session: &Session) -> Result<HandlerResponse> {
        let user_id = event.user_id().ok_or(HandlerError::NoUser)?;
        debug!(user_id = user_id, "step: ensuring user row");
        self.store.ensure_user(user_id).await?;
        Ok(HandlerResponse::Continue)
    }
}
