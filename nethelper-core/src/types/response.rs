/// What a handler tells the dispatcher after processing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Let later handlers see this event too.
    Continue,
    /// Suppress all later handlers for this event.
    Stop,
}

impl HandlerResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerResponse::Continue => "Continue",
            HandlerResponse::Stop => "Stop",
        }
    }
}
