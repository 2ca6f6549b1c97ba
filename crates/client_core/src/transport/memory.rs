use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use shared::protocol::ClientRequest;

use super::{
    ConnectionSignal, ConnectionState, EventHandler, EventKind, HandlerRegistry, InboundEvent,
    Subscription, Transport, TransportError,
};

#[derive(Default)]
struct MemoryState {
    connection: ConnectionState,
    emitted: Vec<ClientRequest>,
    connect_calls: u32,
}

/// In-process channel: records what the core emits and lets the caller play
/// the server side by injecting inbound events.
#[derive(Default)]
pub struct MemoryTransport {
    registry: HandlerRegistry,
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an inbound event to every subscribed handler.
    pub fn inject(&self, event: impl Into<InboundEvent>) -> usize {
        self.registry.dispatch(&event.into())
    }

    pub fn drop_connection(&self) {
        self.set_connection(ConnectionState::Disconnected);
        self.inject(ConnectionSignal::Disconnected);
    }

    pub fn restore_connection(&self) {
        self.set_connection(ConnectionState::Connected);
        self.inject(ConnectionSignal::Reconnected);
    }

    pub fn emitted(&self) -> Vec<ClientRequest> {
        self.lock().emitted.clone()
    }

    pub fn take_emitted(&self) -> Vec<ClientRequest> {
        std::mem::take(&mut self.lock().emitted)
    }

    pub fn connect_calls(&self) -> u32 {
        self.lock().connect_calls
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.registry.handler_count(kind)
    }

    fn set_connection(&self, connection: ConnectionState) {
        self.lock().connection = connection;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        {
            let mut guard = self.lock();
            if guard.connection == ConnectionState::Connected {
                return Ok(());
            }
            guard.connection = ConnectionState::Connected;
            guard.connect_calls += 1;
        }
        self.inject(ConnectionSignal::Connected);
        Ok(())
    }

    fn emit(&self, request: ClientRequest) -> Result<(), TransportError> {
        let mut guard = self.lock();
        if guard.connection != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        guard.emitted.push(request);
        Ok(())
    }

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        self.registry.register(kind, handler)
    }

    fn connection_state(&self) -> ConnectionState {
        self.lock().connection
    }
}
