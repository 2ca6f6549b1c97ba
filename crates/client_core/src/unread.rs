use std::collections::{BTreeMap, HashMap};

use shared::domain::Username;

/// Per-peer unread counters. Whatever peer is active reads as zero.
#[derive(Debug, Clone, Default)]
pub struct UnreadLedger {
    counts: HashMap<Username, u32>,
}

impl UnreadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, peer: &Username) -> u32 {
        self.counts.get(peer).copied().unwrap_or(0)
    }

    /// Bumps `peer` by one unless its conversation is open. Returns the new
    /// count.
    pub fn increment(&mut self, peer: &Username, active: Option<&Username>) -> u32 {
        if active == Some(peer) {
            self.counts.insert(peer.clone(), 0);
            return 0;
        }
        let count = self.counts.entry(peer.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn reset(&mut self, peer: &Username) {
        self.counts.insert(peer.clone(), 0);
    }

    /// Bulk replace from the server; the active peer is pinned to zero.
    pub fn replace_all(&mut self, counts: HashMap<Username, u32>, active: Option<&Username>) {
        self.counts = counts;
        if let Some(active) = active {
            self.counts.insert(active.clone(), 0);
        }
    }

    pub fn total(&self) -> u32 {
        self.counts
            .values()
            .fold(0u32, |total, count| total.saturating_add(*count))
    }

    pub fn snapshot(&self) -> BTreeMap<Username, u32> {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(peer, count)| (peer.clone(), *count))
            .collect()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
#[path = "tests/unread_tests.rs"]
mod tests;
