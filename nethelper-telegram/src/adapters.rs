//! Adapters from Telegram (teloxide) types to nethelper_core types.
//! Shape detection happens here, once per update.

use nethelper_core::{
    CallbackEvent, Chat, Event, EventKind, MediaKind, MessageEvent, MessageRef, User,
};
use serde_json::Value;
use teloxide::types::{MaybeInaccessibleMessage, Message, Update, UpdateKind};
use tracing::warn;

/// Wraps a teloxide User for conversion to core [`User`].
pub struct TelegramUserWrapper<'a>(pub &'a teloxide::types::User);

impl<'a> TelegramUserWrapper<'a> {
    pub fn to_core(&self) -> User {
        User {
            id: self.0.id.0 as i64,
            is_bot: self.0.is_bot,
            username: self.0.username.clone(),
            first_name: Some(self.0.first_name.clone()),
            last_name: self.0.last_name.clone(),
        }
    }
}

fn chat_type(chat: &teloxide::types::Chat) -> &'static str {
    if chat.is_private() {
        "private"
    } else if chat.is_supergroup() {
        "supergroup"
    } else if chat.is_group() {
        "group"
    } else if chat.is_channel() {
        "channel"
    } else {
        "unknown"
    }
}

fn media_kind(msg: &Message) -> Option<MediaKind> {
    if msg.photo().is_some() {
        Some(MediaKind::Photo)
    } else if msg.document().is_some() {
        Some(MediaKind::Document)
    } else if msg.text().is_none() {
        Some(MediaKind::Other("non-text".to_string()))
    } else {
        None
    }
}

fn message_event(msg: &Message) -> MessageEvent {
    MessageEvent {
        message_id: msg.id.0,
        from: msg.from.as_ref().map(|u| TelegramUserWrapper(u).to_core()),
        chat: Chat {
            id: msg.chat.id.0,
            chat_type: chat_type(&msg.chat).to_string(),
        },
        text: msg.text().map(str::to_string),
        media: media_kind(msg),
        date: msg.date,
    }
}

/// Converts one update. Anything that is neither a message nor a callback query becomes
/// [`EventKind::Unsupported`] named after its payload key (`edited_message`, `channel_post`, ...).
pub fn event_from_update(update: &Update) -> Event {
    let raw = serde_json::to_value(update).unwrap_or_else(|e| {
        warn!(error = %e, update_id = update.id.0, "step: update could not be re-serialized");
        Value::Null
    });
    let sequence = i64::from(update.id.0);

    let kind = match &update.kind {
        UpdateKind::Message(msg) => EventKind::Message(message_event(msg)),
        UpdateKind::CallbackQuery(query) => EventKind::Callback(CallbackEvent {
            id: query.id.to_string(),
            from: TelegramUserWrapper(&query.from).to_core(),
            data: query.data.clone().unwrap_or_default(),
            message: match &query.message {
                Some(MaybeInaccessibleMessage::Regular(m)) => Some(MessageRef {
                    chat_id: m.chat.id.0,
                    message_id: m.id.0,
                }),
                _ => None,
            },
        }),
        _ => EventKind::Unsupported(payload_name(&raw)),
    };

    Event {
        sequence,
        kind,
        raw,
    }
}

fn payload_name(raw: &Value) -> String {
    raw.as_object()
        .and_then(|obj| obj.keys().find(|k| k.as_str() != "update_id").cloned())
        .unwrap_or_else(|| "unknown".to_string())
}
