//! First handler in the chain: appends every inbound event to the raw event log.

use std::sync::Arc;

use async_trait::async_trait;
use nethelper_core::{Event, Handler, HandlerResponse, Result, Session, UserStore};
use tracing::{info, instrument};

/// Records each event's raw payload, then lets the chain continue.
pub struct EventLogger {
    pub(crate) store: Arc<dyn UserStore>,
}

impl EventLogger {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for EventLogger {
    fn name(&self) -> &'static str {
        "EventLogger"
    }

    fn can_handle(&self, _event: &Event, _session: &Session) -> bool {
        true
    }

    #[instrument(skip(self, event, _session), fields(update_id = event.sequence))]
    async fn handle(&self, event: &Event, _session: &Session) -> Result<HandlerResponse> {
        info!(
            update_id = event.sequence,
            user_id = ?event.user_id(),
            kind = event.kind_name(),
            "step: recording raw event"
        );
        self.store.record_raw_event(event).await?;
        Ok(HandlerResponse::Continue)
    }
}
