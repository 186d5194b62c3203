//! Storage crate: SQLite persistence for per-user conversation state and the raw update log.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`models`] – row types for `users` and `telegram_updates`
//! - [`user_repo`] – UserRepository, the SQLite [`nethelper_core::UserStore`]
//! - [`sqlite_pool`] – SqlitePoolManager
//! - `retry` – bounded retry for transient SQLite failures

mod error;
mod models;
mod retry;
mod sqlite_pool;
mod user_repo;

pub use error::StorageError;
pub use models::{RawEventRow, UserRow};
pub use sqlite_pool::SqlitePoolManager;
pub use user_repo::UserRepository;
