use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Message, User, Username},
    error::ErrorPayload,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub user1: Username,
    pub user2: Username,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub reader: Username,
    pub sender: Username,
}

/// Body of an outgoing `private-message`. The local send time travels with it
/// so the echo carries the same dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub sender: Username,
    pub receiver: Username,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Message> for OutboundMessage {
    fn from(message: &Message) -> Self {
        Self {
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            text: message.text.clone(),
            timestamp: message.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub reader: Username,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ClientRequest {
    RegisterUser(Username),
    Join(Username),
    GetUsers,
    GetMessages(HistoryRequest),
    MarkRead(MarkReadRequest),
    PrivateMessage(OutboundMessage),
}

impl ClientRequest {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::RegisterUser(_) => "register-user",
            Self::Join(_) => "join",
            Self::GetUsers => "get-users",
            Self::GetMessages(_) => "get-messages",
            Self::MarkRead(_) => "mark-read",
            Self::PrivateMessage(_) => "private-message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    UsersList(Vec<User>),
    UserConnected(Username),
    UserDisconnected(Username),
    UnreadCounts(HashMap<Username, u32>),
    PrivateMessage(Message),
    MessagesRead(ReadReceipt),
    ChatHistory(Vec<Message>),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::UsersList(_) => "users-list",
            Self::UserConnected(_) => "user-connected",
            Self::UserDisconnected(_) => "user-disconnected",
            Self::UnreadCounts(_) => "unread-counts",
            Self::PrivateMessage(_) => "private-message",
            Self::MessagesRead(_) => "messages-read",
            Self::ChatHistory(_) => "chat-history",
            Self::Error(_) => "error",
        }
    }
}
