use shared::{domain::Username, error::ValidationError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no user is registered")]
    NotRegistered,
    #[error("already registered as {0}")]
    AlreadyRegistered(Username),
    #[error("no conversation is selected")]
    NoActiveConversation,
    /// A response that no longer matches the state it was requested for.
    #[error("stale response discarded: {reason}")]
    StaleResponse { reason: String },
    #[error("message from {sender} to {receiver} does not involve the local user")]
    UnrelatedMessage { sender: Username, receiver: Username },
}

impl SyncError {
    pub fn stale(reason: impl Into<String>) -> Self {
        Self::StaleResponse {
            reason: reason.into(),
        }
    }

    /// Races and rejected input are expected; only these are worth showing
    /// the user.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotRegistered
                | Self::AlreadyRegistered(_)
                | Self::NoActiveConversation
        )
    }
}
