//! Core types: inbound events, users and chats, replies, per-user session, handler contract.

mod event;
mod handler;
mod reply;
mod response;
mod session;
mod user;

pub use event::{CallbackEvent, Event, EventKind, MediaKind, MessageEvent, MessageRef};
pub use handler::Handler;
pub use reply::{Button, EditOutcome, Keyboard, ParseMode, Reply};
pub use response::HandlerResponse;
pub use session::{parse_user_data, Session, UserData, UserRecord};
pub use user::{Chat, User};
