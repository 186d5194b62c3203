use chrono::{DateTime, Utc};

/// One row of `telegram_updates`: the payload of an update exactly as received.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawEventRow {
    pub id: i64,
    pub update_id: i64,
    pub user_id: Option<i64>,
    pub kind: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}
