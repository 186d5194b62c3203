//! # nethelper-core
//!
//! Core types and traits for the network helper bot: [`Event`], [`Session`], [`Handler`], the reply
//! transport [`Bot`], the fetch transport [`UpdateSource`], the persistence contract [`UserStore`],
//! and tracing initialization. Transport-agnostic; used by the dispatcher, storage, handlers and
//! the Telegram adapter.

pub mod bot;
pub mod error;
pub mod logger;
pub mod store;
pub mod types;

pub use bot::{Bot, UpdateSource};
pub use error::{BotError, HandlerError, Result};
pub use logger::init_tracing;
pub use store::UserStore;
pub use types::{
    Button, CallbackEvent, Chat, EditOutcome, Event, EventKind, Handler, HandlerResponse, Keyboard,
    MediaKind, MessageEvent, MessageRef, ParseMode, Reply, Session, User, UserData, UserRecord,
    parse_user_data,
};
