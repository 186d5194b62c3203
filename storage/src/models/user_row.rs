use nethelper_core::{parse_user_data, UserRecord};
use tracing::warn;

/// One row of `users`. `data` is a JSON object serialized as text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub telegram_id: i64,
    pub state: Option<String>,
    pub data: Option<String>,
}

impl UserRow {
    /// Converts to the core record. A NULL state is idle; a corrupt data blob becomes empty.
    pub fn into_record(self) -> UserRecord {
        let raw = self.data.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let data = parse_user_data(raw);
        if let Some(raw) = raw {
            if data.is_empty() && raw != "{}" {
                warn!(user_id = self.telegram_id, "Corrupt user data blob, treating as empty");
            }
        }
        UserRecord {
            user_id: self.telegram_id,
            state: self.state.unwrap_or_default(),
            data,
        }
    }
}
