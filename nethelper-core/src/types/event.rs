//! Inbound events. Shape detection happens once, at ingestion; handlers match on [`EventKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::user::{Chat, User};

/// One inbound unit from the messaging platform.
///
/// `sequence` is the platform's strictly increasing update id and drives the polling cursor.
/// `raw` keeps the payload exactly as received, for the raw event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub sequence: i64,
    pub kind: EventKind,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    Message(MessageEvent),
    Callback(CallbackEvent),
    /// Any other update shape (edited messages, channel posts, ...). Carries the shape name.
    Unsupported(String),
}

/// A chat message: originating user (absent for channel posts), chat, and text or media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message_id: i32,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub media: Option<MediaKind>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Document,
    Other(String),
}

/// Address of a message the bot already sent, for in-place edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// A button press: opaque payload tied to the message that carried the keyboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEvent {
    pub id: String,
    pub from: User,
    pub data: String,
    /// `None` when the originating message is too old to be addressed.
    pub message: Option<MessageRef>,
}

impl Event {
    /// Acting user id: message sender or callback sender. `None` means anonymous.
    pub fn user_id(&self) -> Option<i64> {
        match &self.kind {
            EventKind::Message(m) => m.from.as_ref().map(|u| u.id),
            EventKind::Callback(c) => Some(c.from.id),
            EventKind::Unsupported(_) => None,
        }
    }

    /// Chat to reply into.
    pub fn chat_id(&self) -> Option<i64> {
        match &self.kind {
            EventKind::Message(m) => Some(m.chat.id),
            EventKind::Callback(c) => c.message.map(|m| m.chat_id),
            EventKind::Unsupported(_) => None,
        }
    }

    /// Free text of a message event.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Message(m) => m.text.as_deref(),
            _ => None,
        }
    }

    /// Payload of a callback event.
    pub fn callback_data(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Callback(c) => Some(c.data.as_str()),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageEvent> {
        match &self.kind {
            EventKind::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&CallbackEvent> {
        match &self.kind {
            EventKind::Callback(c) => Some(c),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &str {
        match &self.kind {
            EventKind::Message(_) => "message",
            EventKind::Callback(_) => "callback_query",
            EventKind::Unsupported(name) => name.as_str(),
        }
    }

    /// Builds a private-chat text message event (chat id == user id), raw payload included.
    pub fn text_message(sequence: i64, user_id: i64, text: &str) -> Self {
        let message_id = (sequence % i64::from(i32::MAX)) as i32;
        Self {
            sequence,
            kind: EventKind::Message(MessageEvent {
                message_id,
                from: Some(User::with_id(user_id)),
                chat: Chat::private(user_id),
                text: Some(text.to_string()),
                media: None,
                date: Utc::now(),
            }),
            raw: json!({
                "update_id": sequence,
                "message": {
                    "message_id": message_id,
                    "from": { "id": user_id, "is_bot": false },
                    "chat": { "id": user_id, "type": "private" },
                    "text": text,
                }
            }),
        }
    }

    /// Builds a callback event for a button on message `message_id` in the user's private chat.
    pub fn callback_query(sequence: i64, user_id: i64, message_id: i32, data: &str) -> Self {
        let id = format!("cb-{}", sequence);
        Self {
            sequence,
            kind: EventKind::Callback(CallbackEvent {
                id: id.clone(),
                from: User::with_id(user_id),
                data: data.to_string(),
                message: Some(MessageRef {
                    chat_id: user_id,
                    message_id,
                }),
            }),
            raw: json!({
                "update_id": sequence,
                "callback_query": {
                    "id": id,
                    "from": { "id": user_id, "is_bot": false },
                    "message": {
                        "message_id": message_id,
                        "chat": { "id": user_id, "type": "private" },
                    },
                    "data": data,
                }
            }),
        }
    }
}
