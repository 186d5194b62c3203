//! Outbound reply: text plus optional inline keyboard and formatting mode.

use serde::{Deserialize, Serialize};

/// Formatting mode; plain text when a reply carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Html,
}

/// One inline button that sends `callback_data` back as a callback event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

impl Button {
    pub fn callback(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Inline keyboard, row by row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    /// All callback payloads, in reading order.
    pub fn callback_payloads(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .map(|b| b.callback_data.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub parse_mode: Option<ParseMode>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            parse_mode: None,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            parse_mode: Some(ParseMode::Html),
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Result of editing an already-sent message.
///
/// `NotModified` and `MessageGone` are benign: the caller decides whether to fall back to a new
/// message, but neither is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    NotModified,
    MessageGone,
}

impl EditOutcome {
    pub fn is_edited(&self) -> bool {
        matches!(self, EditOutcome::Edited)
    }
}
