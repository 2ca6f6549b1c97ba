use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::{
    error::ErrorPayload,
    protocol::{ClientRequest, ServerEvent},
};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{
    ConnectionSignal, ConnectionState, EventHandler, EventKind, HandlerRegistry, InboundEvent,
    Subscription, Transport, TransportError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Doubles per failed attempt, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

#[derive(Default)]
struct WsShared {
    state: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<ClientRequest>>,
    task: Option<JoinHandle<()>>,
}

/// JSON-over-websocket channel. Every frame is `{"event": .., "payload": ..}`.
/// Owns reconnection: after a drop it retries with backoff and signals
/// `Reconnected` once the channel is back.
pub struct WebSocketTransport {
    url: String,
    policy: ReconnectPolicy,
    registry: HandlerRegistry,
    shared: Arc<Mutex<WsShared>>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
            registry: HandlerRegistry::new(),
            shared: Arc::new(Mutex::new(WsShared::default())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stops the connection task. No reconnect is attempted afterwards.
    pub fn close(&self) {
        let was_connected = {
            let mut guard = lock(&self.shared);
            guard.outbound = None;
            if let Some(task) = guard.task.take() {
                task.abort();
            }
            let was_connected = guard.state == ConnectionState::Connected;
            guard.state = ConnectionState::Disconnected;
            was_connected
        };
        if was_connected {
            self.registry
                .dispatch(&InboundEvent::Connection(ConnectionSignal::Disconnected));
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        let mut guard = lock(&self.shared);
        guard.outbound = None;
        if let Some(task) = guard.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        {
            let mut guard = lock(&self.shared);
            if guard.state != ConnectionState::Disconnected || guard.task.is_some() {
                return Ok(());
            }
            guard.state = ConnectionState::Connecting;
        }

        let stream = match connect_async(self.url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(err) => {
                lock(&self.shared).state = ConnectionState::Disconnected;
                return Err(TransportError::Connect(format!("{}: {err}", self.url)));
            }
        };
        info!(url = %self.url, "transport: websocket connected");

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut guard = lock(&self.shared);
            guard.outbound = Some(tx);
            guard.state = ConnectionState::Connected;
        }
        self.registry
            .dispatch(&InboundEvent::Connection(ConnectionSignal::Connected));

        let task = tokio::spawn(drive_connection(
            self.url.clone(),
            self.policy,
            self.registry.clone(),
            Arc::clone(&self.shared),
            stream,
            rx,
        ));
        lock(&self.shared).task = Some(task);
        Ok(())
    }

    fn emit(&self, request: ClientRequest) -> Result<(), TransportError> {
        let guard = lock(&self.shared);
        if guard.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let sender = guard.outbound.as_ref().ok_or(TransportError::Closed)?;
        debug!(event = request.event_name(), "transport: queue outbound");
        sender.send(request).map_err(|_| TransportError::Closed)
    }

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Subscription {
        self.registry.register(kind, handler)
    }

    fn connection_state(&self) -> ConnectionState {
        lock(&self.shared).state
    }
}

fn lock(shared: &Mutex<WsShared>) -> std::sync::MutexGuard<'_, WsShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Dropped,
    Shutdown,
}

async fn drive_connection(
    url: String,
    policy: ReconnectPolicy,
    registry: HandlerRegistry,
    shared: Arc<Mutex<WsShared>>,
    mut stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientRequest>,
) {
    loop {
        let end = run_session(stream, &mut outbound, &registry).await;
        lock(&shared).state = ConnectionState::Disconnected;
        registry.dispatch(&InboundEvent::Connection(ConnectionSignal::Disconnected));
        if end == SessionEnd::Shutdown {
            return;
        }

        // Requests queued while the channel was down are not replayed.
        while outbound.try_recv().is_ok() {}

        stream = reconnect(&url, &policy, &shared).await;
        lock(&shared).state = ConnectionState::Connected;
        info!(url = %url, "transport: websocket reconnected");
        registry.dispatch(&InboundEvent::Connection(ConnectionSignal::Reconnected));
    }
}

async fn reconnect(url: &str, policy: &ReconnectPolicy, shared: &Mutex<WsShared>) -> WsStream {
    let mut attempt = 0u32;
    loop {
        let delay = policy.delay_for(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "transport: reconnect scheduled");
        tokio::time::sleep(delay).await;

        lock(shared).state = ConnectionState::Connecting;
        match connect_async(url).await {
            Ok((stream, _)) => return stream,
            Err(err) => {
                warn!(attempt, "transport: reconnect failed: {err}");
                lock(shared).state = ConnectionState::Disconnected;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

async fn run_session(
    stream: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<ClientRequest>,
    registry: &HandlerRegistry,
) -> SessionEnd {
    let (mut writer, mut reader) = stream.split();
    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event = match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => event,
                        Err(err) => ServerEvent::Error(ErrorPayload::new(format!(
                            "invalid server event: {err}"
                        ))),
                    };
                    registry.dispatch(&InboundEvent::Server(event));
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    registry.dispatch(&InboundEvent::Server(ServerEvent::Error(
                        ErrorPayload::new(format!("websocket receive failed: {err}")),
                    )));
                    return SessionEnd::Dropped;
                }
            },
            request = outbound.recv() => {
                let Some(request) = request else {
                    let _ = writer.close().await;
                    return SessionEnd::Shutdown;
                };
                let text = match serde_json::to_string(&request) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(event = request.event_name(), "transport: failed to encode request: {err}");
                        continue;
                    }
                };
                if let Err(err) = writer.send(Message::Text(text)).await {
                    registry.dispatch(&InboundEvent::Server(ServerEvent::Error(
                        ErrorPayload::new(format!("websocket send failed: {err}")),
                    )));
                    return SessionEnd::Dropped;
                }
            }
        }
    }
}
