use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Event has no originating user")]
    NoUser,

    #[error("Event has no chat to reply to")]
    NoChat,

    #[error("Unexpected event for this handler: {0}")]
    UnexpectedEvent(String),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
