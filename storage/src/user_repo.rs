//! User repository: per-user state/data and the raw update log.
//!
//! Uses SqlitePoolManager and the row models. Writes go through bounded retry; reads do not.

use async_trait::async_trait;
use chrono::Utc;
use nethelper_core::{Event, UserData, UserRecord, UserStore};
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::models::{RawEventRow, UserRow};
use crate::retry::with_retry;
use crate::sqlite_pool::SqlitePoolManager;

#[derive(Clone)]
pub struct UserRepository {
    pool_manager: SqlitePoolManager,
}

impl UserRepository {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let repo = Self { pool_manager };
        repo.init().await?;
        Ok(repo)
    }

    /// Underlying pool, for maintenance queries outside the repository API.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.pool_manager.pool()
    }

    async fn init(&self) -> Result<(), sqlx::Error> {
        info!("Creating database tables if not exist");

        let pool = self.pool_manager.pool();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                telegram_id INTEGER PRIMARY KEY,
                state TEXT NOT NULL DEFAULT '',
                data TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS telegram_updates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                update_id INTEGER NOT NULL UNIQUE,
                user_id INTEGER,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                received_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_telegram_updates_user_id ON telegram_updates(user_id)")
            .execute(pool)
            .await?;

        info!("Database tables created successfully");
        Ok(())
    }

    pub async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT telegram_id, state, data FROM users WHERE telegram_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool_manager.pool())
        .await?;

        Ok(row.map(UserRow::into_record))
    }

    pub async fn insert_user_if_absent(&self, user_id: i64) -> Result<bool, StorageError> {
        let pool = self.pool_manager.pool();
        let now = Utc::now();
        let result = with_retry("ensure_user", || {
            sqlx::query(
                "INSERT OR IGNORE INTO users (telegram_id, state, data, created_at, updated_at) VALUES (?, '', '{}', ?, ?)",
            )
            .bind(user_id)
            .bind(now)
            .bind(now)
            .execute(pool)
        })
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            info!(user_id = user_id, "Created user row");
        }
        Ok(created)
    }

    pub async fn update_state(&self, user_id: i64, state: &str) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        let now = Utc::now();
        with_retry("set_state", || {
            sqlx::query(
                r#"
                INSERT INTO users (telegram_id, state, data, created_at, updated_at)
                VALUES (?, ?, '{}', ?, ?)
                ON CONFLICT(telegram_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at
                "#,
            )
            .bind(user_id)
            .bind(state)
            .bind(now)
            .bind(now)
            .execute(pool)
        })
        .await?;

        debug!(user_id = user_id, state = %state, "Saved user state");
        Ok(())
    }

    pub async fn update_data(&self, user_id: i64, data: &UserData) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        let encoded = serde_json::to_string(data)?;
        let now = Utc::now();
        with_retry("set_data", || {
            sqlx::query(
                r#"
                INSERT INTO users (telegram_id, state, data, created_at, updated_at)
                VALUES (?, '', ?, ?, ?)
                ON CONFLICT(telegram_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
                "#,
            )
            .bind(user_id)
            .bind(&encoded)
            .bind(now)
            .bind(now)
            .execute(pool)
        })
        .await?;

        debug!(user_id = user_id, keys = data.len(), "Saved user data");
        Ok(())
    }

    /// Inserts the raw payload; a second insert for the same `update_id` is ignored.
    pub async fn insert_raw_event(&self, event: &Event) -> Result<bool, StorageError> {
        let pool = self.pool_manager.pool();
        let payload = serde_json::to_string(&event.raw)?;
        let kind = event.kind_name().to_string();
        let user_id = event.user_id();
        let now = Utc::now();
        let result = with_retry("record_raw_event", || {
            sqlx::query(
                "INSERT OR IGNORE INTO telegram_updates (update_id, user_id, kind, payload, received_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(event.sequence)
            .bind(user_id)
            .bind(&kind)
            .bind(&payload)
            .bind(now)
            .execute(pool)
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_raw_event(&self, update_id: i64) -> Result<Option<RawEventRow>, StorageError> {
        let row = sqlx::query_as::<_, RawEventRow>(
            "SELECT id, update_id, user_id, kind, payload, received_at FROM telegram_updates WHERE update_id = ?",
        )
        .bind(update_id)
        .fetch_optional(self.pool_manager.pool())
        .await?;
        Ok(row)
    }

    pub async fn raw_event_count(&self) -> Result<i64, StorageError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM telegram_updates")
            .fetch_one(self.pool_manager.pool())
            .await?;
        Ok(count.0)
    }

    /// Clears every `*_RUNNING` state tag. Only valid while no dispatcher is running, e.g. at
    /// startup: a tag that survived a restart belongs to a probe that will never finish.
    #[instrument(skip(self))]
    pub async fn reset_running_states(&self) -> Result<u64, StorageError> {
        let pool = self.pool_manager.pool();
        let now = Utc::now();
        let result = with_retry("reset_running_states", || {
            sqlx::query(
                r#"UPDATE users SET state = '', updated_at = ? WHERE state LIKE '%\_RUNNING' ESCAPE '\'"#,
            )
            .bind(now)
            .execute(pool)
        })
        .await?;

        info!(reset = result.rows_affected(), "Cleared stale RUNNING states");
        Ok(result.rows_affected())
    }

    /// Returns the user to idle with empty data. `false` if the user does not exist.
    pub async fn reset_user(&self, user_id: i64) -> Result<bool, StorageError> {
        let pool = self.pool_manager.pool();
        let now = Utc::now();
        let result = with_retry("reset_user", || {
            sqlx::query("UPDATE users SET state = '', data = '{}', updated_at = ? WHERE telegram_id = ?")
                .bind(now)
                .bind(user_id)
                .execute(pool)
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn get_user(&self, user_id: i64) -> nethelper_core::Result<Option<UserRecord>> {
        Ok(self.find_user(user_id).await?)
    }

    async fn ensure_user(&self, user_id: i64) -> nethelper_core::Result<()> {
        self.insert_user_if_absent(user_id).await?;
        Ok(())
    }

    async fn set_state(&self, user_id: i64, state: &str) -> nethelper_core::Result<()> {
        Ok(self.update_state(user_id, state).await?)
    }

    async fn set_data(&self, user_id: i64, data: &UserData) -> nethelper_core::Result<()> {
        Ok(self.update_data(user_id, data).await?)
    }

    async fn record_raw_event(&self, event: &Event) -> nethelper_core::Result<()> {
        self.insert_raw_event(event).await?;
        Ok(())
    }
}
