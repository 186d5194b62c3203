//! Transport abstractions.
//!
//! [`Bot`] pushes replies, [`UpdateSource`] pulls events. Both are transport-agnostic; the
//! Telegram crate implements them over teloxide and tests substitute recording mocks.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{EditOutcome, Event, MessageRef, Reply};

/// Sends, edits and acknowledges on behalf of handlers.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends a new message and returns its address for later edits.
    async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<MessageRef>;

    /// Replaces the text (and keyboard) of a sent message. "Not modified" and "message gone" are
    /// reported as benign outcomes, not errors.
    async fn edit_reply(&self, message: MessageRef, reply: &Reply) -> Result<EditOutcome>;

    /// Stops the client-side spinner of a button press.
    async fn acknowledge_callback(&self, callback_id: &str) -> Result<()>;

    /// Shows "typing..." in the chat.
    async fn send_typing(&self, chat_id: i64) -> Result<()>;
}

/// Pulls events newer than a cursor.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Returns up to `limit` events with sequence >= `cursor`, in increasing order, waiting up to
    /// `wait` for the first one to arrive.
    async fn fetch(&self, cursor: i64, wait: Duration, limit: u8) -> Result<Vec<Event>>;
}
