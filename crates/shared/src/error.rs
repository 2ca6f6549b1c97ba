use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload of the server's `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Input rejected locally, before anything reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("message text must not be empty")]
    EmptyMessage,
    #[error("cannot open a conversation with yourself")]
    SelfConversation,
}
