use shared::domain::Username;

use crate::error::SyncError;

/// Process-wide identity. Everything else in the client is scoped to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    current_user: Option<Username>,
}

impl Session {
    pub fn current_user(&self) -> Option<&Username> {
        self.current_user.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn require_user(&self) -> Result<&Username, SyncError> {
        self.current_user.as_ref().ok_or(SyncError::NotRegistered)
    }

    pub fn ensure_unregistered(&self) -> Result<(), SyncError> {
        match &self.current_user {
            Some(user) => Err(SyncError::AlreadyRegistered(user.clone())),
            None => Ok(()),
        }
    }

    pub fn register(&mut self, user: Username) {
        self.current_user = Some(user);
    }

    pub fn reset(&mut self) {
        self.current_user = None;
    }
}
