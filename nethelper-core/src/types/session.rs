//! Per-user conversation state as seen by handlers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open-ended per-user context. Each handler owns a namespaced subset of keys.
pub type UserData = Map<String, Value>;

/// Persisted user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub state: String,
    pub data: UserData,
}

/// Decodes a stored data blob. Missing, corrupt or non-object blobs decode to an empty mapping.
pub fn parse_user_data(raw: Option<&str>) -> UserData {
    match raw.map(str::trim) {
        None | Some("") => UserData::new(),
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            _ => UserData::new(),
        },
    }
}

/// State and data loaded for the acting user of one event. Empty state means idle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user_id: Option<i64>,
    pub state: String,
    pub data: UserData,
}

impl Session {
    /// Session for events without an identifiable user.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Idle session for a known user who has no row yet.
    pub fn idle(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn from_record(record: UserRecord) -> Self {
        Self {
            user_id: Some(record.user_id),
            state: record.state,
            data: record.data,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_empty()
    }

    pub fn in_state(&self, tags: &[&str]) -> bool {
        tags.contains(&self.state.as_str())
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}
