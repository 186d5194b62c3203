//! Persistence contract for per-user state and the raw event log.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Event, UserData, UserRecord};

/// Durable per-user state/data plus raw event log. Each call is an independent write; there is
/// no transaction spanning several calls.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the user row, or `None` if the user was never seen. Corrupt data reads as empty.
    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>>;

    /// Creates an idle row if absent; no-op otherwise.
    async fn ensure_user(&self, user_id: i64) -> Result<()>;

    async fn set_state(&self, user_id: i64, state: &str) -> Result<()>;

    async fn set_data(&self, user_id: i64, data: &UserData) -> Result<()>;

    /// Appends the raw payload of an event. Recording the same sequence twice keeps one row.
    async fn record_raw_event(&self, event: &Event) -> Result<()>;
}
