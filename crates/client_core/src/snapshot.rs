use std::collections::BTreeMap;

use shared::domain::{Message, User, Username};

use crate::transport::ConnectionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub user: User,
    pub unread: u32,
    /// `Online` or `Last seen ...`, computed when the snapshot was taken.
    pub status: String,
}

/// Immutable read model handed to whatever renders the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatSnapshot {
    pub current_user: Option<Username>,
    pub selected_peer: Option<Username>,
    pub connection: ConnectionState,
    pub roster: Vec<RosterEntry>,
    pub conversation: Vec<Message>,
    pub unread: BTreeMap<Username, u32>,
    pub total_unread: u32,
}

impl ChatSnapshot {
    pub fn roster_entry(&self, username: &str) -> Option<&RosterEntry> {
        self.roster
            .iter()
            .find(|entry| entry.user.username.as_str() == username)
    }

    pub fn unread_for(&self, peer: &str) -> u32 {
        self.unread.get(peer).copied().unwrap_or(0)
    }

    pub fn roster_names(&self) -> Vec<&str> {
        self.roster
            .iter()
            .map(|entry| entry.user.username.as_str())
            .collect()
    }
}
