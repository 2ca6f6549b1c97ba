//! Event-channel boundary: the core only ever sees named inbound events and
//! emits named outbound requests through a [`Transport`].

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use async_trait::async_trait;
use shared::protocol::{ClientRequest, ServerEvent};
use thiserror::Error;

mod memory;
mod websocket;

pub use memory::MemoryTransport;
pub use websocket::{ReconnectPolicy, WebSocketTransport};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("transport channel closed")]
    Closed,
    #[error("failed to connect: {0}")]
    Connect(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSignal {
    Connected,
    Disconnected,
    Reconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Server(ServerEvent),
    Connection(ConnectionSignal),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Server(ServerEvent::UsersList(_)) => EventKind::UsersList,
            Self::Server(ServerEvent::UserConnected(_)) => EventKind::UserConnected,
            Self::Server(ServerEvent::UserDisconnected(_)) => EventKind::UserDisconnected,
            Self::Server(ServerEvent::UnreadCounts(_)) => EventKind::UnreadCounts,
            Self::Server(ServerEvent::PrivateMessage(_)) => EventKind::PrivateMessage,
            Self::Server(ServerEvent::MessagesRead(_)) => EventKind::MessagesRead,
            Self::Server(ServerEvent::ChatHistory(_)) => EventKind::ChatHistory,
            Self::Server(ServerEvent::Error(_)) => EventKind::Error,
            Self::Connection(_) => EventKind::Connection,
        }
    }
}

impl From<ServerEvent> for InboundEvent {
    fn from(event: ServerEvent) -> Self {
        Self::Server(event)
    }
}

impl From<ConnectionSignal> for InboundEvent {
    fn from(signal: ConnectionSignal) -> Self {
        Self::Connection(signal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UsersList,
    UserConnected,
    UserDisconnected,
    UnreadCounts,
    PrivateMessage,
    MessagesRead,
    ChatHistory,
    Error,
    Connection,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::UsersList,
        EventKind::UserConnected,
        EventKind::UserDisconnected,
        EventKind::UnreadCounts,
        EventKind::PrivateMessage,
        EventKind::MessagesRead,
        EventKind::ChatHistory,
        EventKind::Error,
        EventKind::Connection,
    ];
}

pub type EventHandler = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the channel. Calling it on a live channel is a no-op.
    async fn connect(&self) -> Result<(), TransportError>;
    /// Fire-and-forget; success only means the request was queued.
    fn emit(&self, request: ClientRequest) -> Result<(), TransportError>;
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Subscription;
    fn connection_state(&self) -> ConnectionState;
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, EventHandler)>>,
}

/// Per-kind handler lists shared by every transport implementation.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.next_id += 1;
        let id = guard.next_id;
        guard.handlers.entry(kind).or_default().push((id, handler));
        Subscription {
            registry: Arc::downgrade(&self.inner),
            kind,
            id,
            released: false,
        }
    }

    /// Runs every handler registered for the event's kind, in registration
    /// order, and returns how many ran. Handlers are invoked outside the lock.
    pub fn dispatch(&self, event: &InboundEvent) -> usize {
        let handlers: Vec<EventHandler> = {
            let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            guard
                .handlers
                .get(&event.kind())
                .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.handlers.get(&kind).map_or(0, Vec::len)
    }
}

/// Disposer returned by [`Transport::subscribe`]. Dropping it unregisters the
/// handler as well.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    registry: Weak<Mutex<RegistryInner>>,
    kind: EventKind,
    id: u64,
    released: bool,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = guard.handlers.get_mut(&self.kind) {
            entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
#[path = "../tests/transport_tests.rs"]
mod tests;
