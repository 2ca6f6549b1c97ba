//! Roster of known users. The server snapshot is the only source of truth:
//! presence signals never patch an entry, they ask for a fresh snapshot.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use shared::domain::{User, Username};

#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    roster: Vec<User>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full replace. Drops the local user and orders online users first, then
    /// by name.
    pub fn apply_roster_snapshot(&mut self, users: Vec<User>, current_user: &Username) {
        let mut roster: Vec<User> = users
            .into_iter()
            .filter(|user| &user.username != current_user)
            .collect();
        roster.sort_by(roster_order);
        self.roster = roster;
    }

    /// Returns whether a roster re-fetch should be requested. Our own
    /// connect signal carries nothing new.
    pub fn mark_online(&self, username: &Username, current_user: &Username) -> bool {
        username != current_user
    }

    pub fn mark_offline(&self, _username: &Username) -> bool {
        true
    }

    pub fn roster(&self) -> &[User] {
        &self.roster
    }

    pub fn find(&self, username: &Username) -> Option<&User> {
        self.roster.iter().find(|user| &user.username == username)
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn clear(&mut self) {
        self.roster.clear();
    }
}

pub fn roster_order(a: &User, b: &User) -> Ordering {
    b.is_online
        .cmp(&a.is_online)
        .then_with(|| collate(a.username.as_str(), b.username.as_str()))
}

/// Case-insensitive first; on a tie the lower-case spelling sorts first.
/// This compares code points, not locale collation: accented names such as
/// "élise" sort after "zed".
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

pub fn format_last_seen(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - last_seen).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if hours < 24 {
        format!("{hours} hr ago")
    } else if days < 7 {
        format!("{days} day ago")
    } else {
        last_seen.format("%Y-%m-%d").to_string()
    }
}

pub fn status_label(user: &User, now: DateTime<Utc>) -> String {
    if user.is_online {
        return "Online".to_string();
    }
    match user.last_seen {
        Some(last_seen) => format!("Last seen {}", format_last_seen(last_seen, now)),
        None => "Last seen unknown".to_string(),
    }
}

#[cfg(test)]
#[path = "tests/presence_tests.rs"]
mod tests;
