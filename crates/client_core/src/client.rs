use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use anyhow::{Context, Result};
use chrono::Utc;
use shared::{domain::Username, protocol::ClientRequest};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::SyncError,
    identity::IdentityStore,
    notify::Notifier,
    snapshot::ChatSnapshot,
    sync::{Effect, Input, LocalAction, Notification, SyncCore, SyncSettings},
    transport::{ConnectionState, EventKind, InboundEvent, Subscription, Transport},
};

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SnapshotUpdated(ChatSnapshot),
    Notification(Notification),
    Error(String),
}

/// Runtime around [`SyncCore`]: feeds it transport events and local actions,
/// performs the effects it returns and publishes snapshots.
///
/// Every input goes through one lock, so handlers never overlap; inbound
/// events are applied on the thread that delivers them, in delivery order.
pub struct ChatClient {
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    identity: Arc<dyn IdentityStore>,
    core: Mutex<SyncCore>,
    subscriptions: Mutex<Vec<Subscription>>,
    events: broadcast::Sender<ClientEvent>,
}

impl ChatClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        identity: Arc<dyn IdentityStore>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            transport,
            notifier,
            identity,
            core: Mutex::new(SyncCore::new(settings)),
            subscriptions: Mutex::new(Vec::new()),
            events,
        })
    }

    /// Subscribes to every inbound event kind and connects the transport.
    /// Safe to call again after a failed connect.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut subscriptions = lock(&self.subscriptions);
            if subscriptions.is_empty() {
                for kind in EventKind::ALL {
                    let client: Weak<Self> = Arc::downgrade(self);
                    subscriptions.push(self.transport.subscribe(
                        kind,
                        Arc::new(move |event: &InboundEvent| {
                            if let Some(client) = client.upgrade() {
                                client.handle_inbound(event.clone());
                            }
                        }),
                    ));
                }
            }
        }

        self.transport
            .connect()
            .await
            .context("failed to connect transport")?;
        info!("client: transport connected");
        Ok(())
    }

    /// Restores the identity saved by a previous run, if any.
    pub fn resume_persisted_session(&self) -> Result<Option<Username>> {
        let Some(user) = self.identity.load().context("failed to load identity")? else {
            return Ok(None);
        };
        self.process(LocalAction::Resume(user.clone()).into())?;
        Ok(Some(user))
    }

    pub fn register(&self, username: &str) -> Result<(), SyncError> {
        self.process(LocalAction::Register(username.to_string()).into())
    }

    pub fn select_peer(&self, peer: &str) -> Result<(), SyncError> {
        let peer = Username::parse(peer)?;
        self.process(LocalAction::SelectPeer(peer).into())
    }

    pub fn close_conversation(&self) -> Result<(), SyncError> {
        self.process(LocalAction::CloseConversation.into())
    }

    /// Emits the message; it shows up once the server echoes it back (or
    /// immediately, as pending, with optimistic send enabled).
    pub fn send_message(&self, text: &str) -> Result<(), SyncError> {
        self.process(
            LocalAction::Send {
                text: text.to_string(),
                sent_at: Utc::now(),
            }
            .into(),
        )
    }

    pub fn logout(&self) -> Result<(), SyncError> {
        self.process(LocalAction::Logout.into())
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        lock(&self.core).snapshot(Utc::now())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.connection_state()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Drops every transport subscription; later events are ignored.
    pub fn shutdown(&self) {
        let subscriptions = std::mem::take(&mut *lock(&self.subscriptions));
        for subscription in subscriptions {
            subscription.dispose();
        }
        info!("client: shut down");
    }

    fn handle_inbound(&self, event: InboundEvent) {
        let kind = event.kind();
        if let Err(err) = self.process(Input::Inbound(event)) {
            debug!(?kind, "client: inbound event rejected: {err}");
        }
    }

    fn process(&self, input: Input) -> Result<(), SyncError> {
        let (deferred, snapshot) = {
            let mut core = lock(&self.core);
            let effects = core.handle(input)?;
            // Emits stay under the lock so requests leave in the order the
            // core planned them.
            let mut deferred = Vec::new();
            for effect in effects {
                match effect {
                    Effect::Emit(request) => self.emit(request),
                    other => deferred.push(other),
                }
            }
            (deferred, core.snapshot(Utc::now()))
        };

        for effect in deferred {
            match effect {
                Effect::Notify(notification) => {
                    self.notifier.notify(&notification);
                    let _ = self.events.send(ClientEvent::Notification(notification));
                }
                Effect::Alert(message) => {
                    warn!("client: server error: {message}");
                    let _ = self.events.send(ClientEvent::Error(message));
                }
                Effect::PersistIdentity(user) => {
                    if let Err(err) = self.identity.save(user.as_ref()) {
                        warn!("client: failed to persist identity: {err:#}");
                        let _ = self
                            .events
                            .send(ClientEvent::Error(format!("failed to persist identity: {err}")));
                    }
                }
                Effect::Emit(request) => self.emit(request),
            }
        }

        let _ = self.events.send(ClientEvent::SnapshotUpdated(snapshot));
        Ok(())
    }

    fn emit(&self, request: ClientRequest) {
        let event = request.event_name();
        match self.transport.emit(request) {
            Ok(()) => debug!(event, "client: emitted"),
            Err(err) => {
                warn!(event, "client: emit failed: {err}");
                let _ = self
                    .events
                    .send(ClientEvent::Error(format!("failed to send {event}: {err}")));
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
