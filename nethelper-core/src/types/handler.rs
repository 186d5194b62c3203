//! Handler contract.

use async_trait::async_trait;

use super::{event::Event, response::HandlerResponse, session::Session};

/// One self-contained unit of the dispatch chain.
///
/// The dispatcher asks [`Handler::can_handle`] first; `true` commits it to calling
/// [`Handler::handle`] for this handler on this event.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs. Defaults to the implementing type's path.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Pure predicate. Must not mutate anything and must accept an idle/empty session.
    fn can_handle(&self, event: &Event, session: &Session) -> bool;

    /// Processes the event. May persist state/data and send replies. State must live in the
    /// store, never in the handler, so a restart between events loses nothing.
    async fn handle(&self, event: &Event, session: &Session) -> crate::error::Result<HandlerResponse>;
}
