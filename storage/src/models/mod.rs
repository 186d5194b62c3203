//! Row models for the `users` and `telegram_updates` tables.

mod raw_event;
mod user_row;

pub use raw_event::RawEventRow;
pub use user_row::UserRow;
