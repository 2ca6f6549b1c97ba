//! Per-peer message logs. Each log is kept sorted by timestamp (arrival order
//! on ties) and deduplicated by [`MessageKey`].

use std::collections::{HashMap, HashSet};

use shared::domain::{Message, MessageKey, Username};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// The key matched a locally sent message that was waiting for its echo.
    Confirmed,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryMerge {
    pub snapshot_len: usize,
    pub kept_pending: usize,
}

#[derive(Debug, Clone)]
struct LogEntry {
    message: Message,
    pending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<LogEntry>,
    keys: HashSet<MessageKey>,
}

impl ConversationLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|entry| &entry.message)
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.pending).count()
    }

    pub fn contains(&self, key: &MessageKey) -> bool {
        self.keys.contains(key)
    }

    pub fn is_pending(&self, key: &MessageKey) -> bool {
        self.find(key).is_some_and(|entry| entry.pending)
    }

    fn find(&self, key: &MessageKey) -> Option<&LogEntry> {
        if !self.keys.contains(key) {
            return None;
        }
        self.entries.iter().find(|entry| entry.message.key() == *key)
    }

    fn find_mut(&mut self, key: &MessageKey) -> Option<&mut LogEntry> {
        if !self.keys.contains(key) {
            return None;
        }
        self.entries
            .iter_mut()
            .find(|entry| entry.message.key() == *key)
    }

    fn insert(&mut self, message: Message, pending: bool) -> AppendOutcome {
        let key = message.key();
        if let Some(existing) = self.find_mut(&key) {
            // read only ever moves false -> true
            existing.message.read |= message.read;
            if existing.pending && !pending {
                existing.pending = false;
                return AppendOutcome::Confirmed;
            }
            return AppendOutcome::Duplicate;
        }

        let at = self
            .entries
            .partition_point(|entry| entry.message.timestamp <= message.timestamp);
        self.entries.insert(at, LogEntry { message, pending });
        self.keys.insert(key);
        AppendOutcome::Inserted
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    logs: HashMap<Username, ConversationLog>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a delivered message to `peer`'s log; a redelivery is a no-op.
    pub fn append(&mut self, peer: &Username, message: Message) -> AppendOutcome {
        self.logs
            .entry(peer.clone())
            .or_default()
            .insert(message, false)
    }

    /// Adds a locally sent message ahead of its echo.
    pub fn append_pending(&mut self, peer: &Username, message: Message) -> AppendOutcome {
        self.logs
            .entry(peer.clone())
            .or_default()
            .insert(message, true)
    }

    /// Replaces `peer`'s log with the server snapshot. Pending local sends the
    /// snapshot does not know about yet are carried over, and read flags that
    /// are already set locally stay set.
    pub fn load_history(&mut self, peer: &Username, messages: Vec<Message>) -> HistoryMerge {
        let previous = self.logs.remove(peer).unwrap_or_default();
        let mut log = ConversationLog::default();
        let snapshot_len = messages.len();
        for message in messages {
            log.insert(message, false);
        }

        let mut kept_pending = 0;
        for entry in previous.entries {
            let key = entry.message.key();
            match log.find_mut(&key) {
                Some(existing) => existing.message.read |= entry.message.read,
                None if entry.pending => {
                    log.insert(entry.message, true);
                    kept_pending += 1;
                }
                None => {}
            }
        }

        self.logs.insert(peer.clone(), log);
        HistoryMerge {
            snapshot_len,
            kept_pending,
        }
    }

    /// Flags every message `current_user` sent to `peer` as read and returns
    /// how many flipped.
    pub fn mark_peer_messages_read(&mut self, current_user: &Username, peer: &Username) -> usize {
        let Some(log) = self.logs.get_mut(peer) else {
            return 0;
        };
        let mut flipped = 0;
        for entry in &mut log.entries {
            let message = &mut entry.message;
            if &message.sender == current_user && &message.receiver == peer && !message.read {
                message.read = true;
                flipped += 1;
            }
        }
        flipped
    }

    pub fn log(&self, peer: &Username) -> Option<&ConversationLog> {
        self.logs.get(peer)
    }

    pub fn view(&self, peer: &Username) -> Vec<Message> {
        self.logs
            .get(peer)
            .map(|log| log.messages().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, peer: &Username) -> usize {
        self.logs.get(peer).map_or(0, ConversationLog::len)
    }

    pub fn pending_count(&self, peer: &Username) -> usize {
        self.logs.get(peer).map_or(0, ConversationLog::pending_count)
    }

    pub fn clear(&mut self) {
        self.logs.clear();
    }
}

#[cfg(test)]
#[path = "tests/conversation_tests.rs"]
mod tests;
