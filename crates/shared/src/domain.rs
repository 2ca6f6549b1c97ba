use std::{borrow::Borrow, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Case-sensitive account name; the only identity the chat protocol knows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Trims surrounding whitespace and rejects blank names.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Username {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Username {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Username {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: Username,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    pub fn online(username: impl Into<Username>) -> Self {
        Self {
            username: username.into(),
            is_online: true,
            last_seen: None,
        }
    }

    pub fn offline(username: impl Into<Username>, last_seen: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            is_online: false,
            last_seen: Some(last_seen),
        }
    }
}

/// Duplicate-delivery identity. The server never assigns message ids, so the
/// (sender, receiver, timestamp) triple is all there is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub sender: Username,
    pub receiver: Username,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Username,
    pub receiver: Username,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    pub fn new(
        sender: impl Into<Username>,
        receiver: impl Into<Username>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            text: text.into(),
            timestamp,
            read: false,
        }
    }

    pub fn key(&self) -> MessageKey {
        MessageKey {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            timestamp: self.timestamp,
        }
    }

    /// The other participant as seen from `me`, or `None` when `me` is not a
    /// party to the message.
    pub fn counterparty(&self, me: &Username) -> Option<&Username> {
        if &self.sender == me {
            Some(&self.receiver)
        } else if &self.receiver == me {
            Some(&self.sender)
        } else {
            None
        }
    }

    pub fn is_between(&self, a: &Username, b: &Username) -> bool {
        (&self.sender == a && &self.receiver == b) || (&self.sender == b && &self.receiver == a)
    }
}
