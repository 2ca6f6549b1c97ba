//! Reconciliation policy between the event stream, local actions and the
//! three stores.
//!
//! Handling an input is split in two: [`SyncCore::dispatch`] looks at the
//! input and the current selection and plans a list of [`Command`]s without
//! touching any state; [`SyncCore::apply`] executes the store mutations and
//! hands back the outward [`Effect`]s (emits, notifications, alerts) for the
//! runtime to perform. Stale-response checks happen in `dispatch`, which
//! always runs against the state the commands are applied to.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use shared::{
    domain::{Message, User, Username},
    error::ValidationError,
    protocol::{ClientRequest, HistoryRequest, MarkReadRequest, OutboundMessage, ServerEvent},
};
use tracing::{debug, info};

use crate::{
    conversation::ConversationStore,
    error::SyncError,
    presence::{self, PresenceTracker},
    session::Session,
    snapshot::{ChatSnapshot, RosterEntry},
    transport::{ConnectionSignal, ConnectionState, InboundEvent},
    unread::UnreadLedger,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Show a sent message before its echo comes back.
    pub optimistic_send: bool,
    pub notification_preview_chars: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            optimistic_send: false,
            notification_preview_chars: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAction {
    Register(String),
    /// Restore a persisted identity without registering it again.
    Resume(Username),
    SelectPeer(Username),
    CloseConversation,
    Send { text: String, sent_at: DateTime<Utc> },
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Local(LocalAction),
    Inbound(InboundEvent),
}

impl From<LocalAction> for Input {
    fn from(action: LocalAction) -> Self {
        Self::Local(action)
    }
}

impl From<InboundEvent> for Input {
    fn from(event: InboundEvent) -> Self {
        Self::Inbound(event)
    }
}

impl From<ServerEvent> for Input {
    fn from(event: ServerEvent) -> Self {
        Self::Inbound(InboundEvent::Server(event))
    }
}

impl From<ConnectionSignal> for Input {
    fn from(signal: ConnectionSignal) -> Self {
        Self::Inbound(InboundEvent::Connection(signal))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub from: Username,
    pub preview: String,
    pub unread: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Emit(ClientRequest),
    Notify(Notification),
    /// Non-fatal, user-visible error text.
    Alert(String),
    PersistIdentity(Option<Username>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetCurrentUser(Username),
    ResetSession,
    Select(Option<Username>),
    ExpectHistory(Username),
    ForgetHistoryRequests,
    ReplaceRoster(Vec<User>),
    ReplaceUnread(HashMap<Username, u32>),
    ResetUnread(Username),
    IncrementUnread(Username),
    AppendMessage { peer: Username, message: Message },
    AppendPending { peer: Username, message: Message },
    /// Answers the newest outstanding history request for `peer`; requests
    /// queued before it are dropped as unanswerable.
    LoadHistory { peer: Username, messages: Vec<Message> },
    /// Drops a history response. `answered` names the request it settles.
    DiscardHistory {
        answered: Option<Username>,
        reason: SyncError,
    },
    Discard(SyncError),
    MarkPeerRead(Username),
    SetConnection(ConnectionState),
    Effect(Effect),
}

impl Command {
    fn emit(request: ClientRequest) -> Self {
        Self::Effect(Effect::Emit(request))
    }
}

#[derive(Debug, Default)]
pub struct SyncCore {
    settings: SyncSettings,
    session: Session,
    selected: Option<Username>,
    connection: ConnectionState,
    history_requests: VecDeque<Username>,
    presence: PresenceTracker,
    conversations: ConversationStore,
    unread: UnreadLedger,
}

impl SyncCore {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn current_user(&self) -> Option<&Username> {
        self.session.current_user()
    }

    pub fn selected_peer(&self) -> Option<&Username> {
        self.selected.as_ref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn unread(&self) -> &UnreadLedger {
        &self.unread
    }

    pub fn outstanding_history_requests(&self) -> usize {
        self.history_requests.len()
    }

    /// Plans and applies one input.
    pub fn handle(&mut self, input: impl Into<Input>) -> Result<Vec<Effect>, SyncError> {
        let commands = self.dispatch(input.into())?;
        Ok(self.apply(commands))
    }

    pub fn dispatch(&self, input: Input) -> Result<Vec<Command>, SyncError> {
        match input {
            Input::Local(action) => self.dispatch_local(action),
            Input::Inbound(InboundEvent::Server(event)) => Ok(self.dispatch_server(event)),
            Input::Inbound(InboundEvent::Connection(signal)) => {
                Ok(self.dispatch_connection(signal))
            }
        }
    }

    fn dispatch_local(&self, action: LocalAction) -> Result<Vec<Command>, SyncError> {
        match action {
            LocalAction::Register(raw) => {
                self.session.ensure_unregistered()?;
                let user = Username::parse(&raw)?;
                Ok(vec![
                    Command::SetCurrentUser(user.clone()),
                    Command::emit(ClientRequest::RegisterUser(user.clone())),
                    Command::emit(ClientRequest::Join(user.clone())),
                    Command::emit(ClientRequest::GetUsers),
                    Command::Effect(Effect::PersistIdentity(Some(user))),
                ])
            }
            LocalAction::Resume(user) => {
                self.session.ensure_unregistered()?;
                let user = Username::parse(user.as_str())?;
                Ok(vec![
                    Command::SetCurrentUser(user.clone()),
                    Command::emit(ClientRequest::Join(user)),
                    Command::emit(ClientRequest::GetUsers),
                ])
            }
            LocalAction::SelectPeer(peer) => {
                let me = self.session.require_user()?;
                if &peer == me {
                    return Err(ValidationError::SelfConversation.into());
                }
                if self.selected.as_ref() == Some(&peer) {
                    return Ok(Vec::new());
                }
                let mut commands = vec![Command::Select(Some(peer.clone()))];
                commands.extend(open_conversation(me, &peer));
                commands.push(Command::ResetUnread(peer));
                Ok(commands)
            }
            LocalAction::CloseConversation => {
                if self.selected.is_none() {
                    return Ok(Vec::new());
                }
                Ok(vec![Command::Select(None)])
            }
            LocalAction::Send { text, sent_at } => {
                let me = self.session.require_user()?;
                if text.trim().is_empty() {
                    return Err(ValidationError::EmptyMessage.into());
                }
                let peer = self.selected.as_ref().ok_or(SyncError::NoActiveConversation)?;
                let message = Message::new(me.clone(), peer.clone(), text, sent_at);
                let mut commands = Vec::with_capacity(2);
                let outbound = OutboundMessage::from(&message);
                if self.settings.optimistic_send {
                    commands.push(Command::AppendPending {
                        peer: peer.clone(),
                        message,
                    });
                }
                commands.push(Command::emit(ClientRequest::PrivateMessage(outbound)));
                Ok(commands)
            }
            LocalAction::Logout => Ok(vec![
                Command::ResetSession,
                Command::Effect(Effect::PersistIdentity(None)),
            ]),
        }
    }

    fn dispatch_server(&self, event: ServerEvent) -> Vec<Command> {
        let event_name = event.event_name();
        if let ServerEvent::Error(payload) = event {
            return vec![Command::Effect(Effect::Alert(payload.message))];
        }

        let Some(me) = self.session.current_user() else {
            return vec![Command::Discard(SyncError::stale(format!(
                "{event_name} arrived without a registered session"
            )))];
        };

        match event {
            ServerEvent::UsersList(users) => vec![Command::ReplaceRoster(users)],
            ServerEvent::UserConnected(user) => {
                if self.presence.mark_online(&user, me) {
                    vec![Command::emit(ClientRequest::GetUsers)]
                } else {
                    Vec::new()
                }
            }
            ServerEvent::UserDisconnected(user) => {
                if self.presence.mark_offline(&user) {
                    vec![Command::emit(ClientRequest::GetUsers)]
                } else {
                    Vec::new()
                }
            }
            ServerEvent::UnreadCounts(counts) => vec![Command::ReplaceUnread(counts)],
            ServerEvent::PrivateMessage(message) => self.dispatch_private_message(me, message),
            ServerEvent::MessagesRead(receipt) => {
                if self.selected.as_ref() == Some(&receipt.reader) {
                    vec![Command::MarkPeerRead(receipt.reader)]
                } else {
                    // Not queued: the next history fetch for that peer
                    // carries the real read state.
                    debug!(reader = %receipt.reader, "sync: read receipt for inactive peer");
                    Vec::new()
                }
            }
            ServerEvent::ChatHistory(messages) => self.dispatch_history(me, messages),
            ServerEvent::Error(_) => Vec::new(),
        }
    }

    fn dispatch_private_message(&self, me: &Username, message: Message) -> Vec<Command> {
        let Some(peer) = message.counterparty(me).cloned() else {
            return vec![Command::Discard(SyncError::UnrelatedMessage {
                sender: message.sender,
                receiver: message.receiver,
            })];
        };

        let duplicate = self
            .conversations
            .log(&peer)
            .is_some_and(|log| log.contains(&message.key()));

        let incoming = &message.receiver == me && &message.sender != me;
        let open = incoming && self.selected.as_ref() == Some(&message.sender);

        let mut commands = Vec::with_capacity(3);
        if open {
            // Keeps the sender's read cursor current even on redelivery.
            commands.push(Command::emit(ClientRequest::MarkRead(MarkReadRequest {
                reader: me.clone(),
                sender: message.sender.clone(),
            })));
        } else if incoming && !duplicate {
            commands.push(Command::IncrementUnread(message.sender.clone()));
            commands.push(Command::Effect(Effect::Notify(Notification {
                from: message.sender.clone(),
                preview: preview(&message.text, self.settings.notification_preview_chars),
                unread: self.unread.count(&message.sender).saturating_add(1),
            })));
        }
        commands.insert(0, Command::AppendMessage { peer, message });
        commands
    }

    /// A non-empty snapshot names its own peer, so it is matched by content.
    /// An empty one can only answer the oldest outstanding request.
    fn dispatch_history(&self, me: &Username, messages: Vec<Message>) -> Vec<Command> {
        let selected = self.selected.as_ref();
        let Some(first) = messages.first() else {
            return match self.history_requests.front() {
                Some(front) if selected == Some(front) => vec![Command::LoadHistory {
                    peer: front.clone(),
                    messages,
                }],
                Some(front) => vec![Command::DiscardHistory {
                    answered: Some(front.clone()),
                    reason: SyncError::stale(format!(
                        "empty history for {front} arrived after the selection changed"
                    )),
                }],
                None => vec![Command::DiscardHistory {
                    answered: None,
                    reason: SyncError::stale("chat-history without an outstanding request"),
                }],
            };
        };

        let peer = first
            .counterparty(me)
            .filter(|peer| messages.iter().all(|m| m.is_between(me, peer)))
            .cloned();
        let Some(peer) = peer else {
            return vec![Command::DiscardHistory {
                answered: None,
                reason: SyncError::stale(format!(
                    "chat-history is not a single conversation of {me}"
                )),
            }];
        };
        if selected != Some(&peer) {
            return vec![Command::DiscardHistory {
                reason: SyncError::stale(format!(
                    "history for {peer} arrived after the selection changed"
                )),
                answered: Some(peer),
            }];
        }
        if !self.history_requests.contains(&peer) {
            return vec![Command::DiscardHistory {
                answered: None,
                reason: SyncError::stale(format!(
                    "history for {peer} was not requested or is already loaded"
                )),
            }];
        }
        vec![Command::LoadHistory { peer, messages }]
    }

    fn dispatch_connection(&self, signal: ConnectionSignal) -> Vec<Command> {
        match signal {
            ConnectionSignal::Connected => {
                vec![Command::SetConnection(ConnectionState::Connected)]
            }
            ConnectionSignal::Disconnected => vec![
                Command::SetConnection(ConnectionState::Disconnected),
                Command::ForgetHistoryRequests,
            ],
            ConnectionSignal::Reconnected => {
                let mut commands = vec![
                    Command::SetConnection(ConnectionState::Connected),
                    Command::ForgetHistoryRequests,
                ];
                if let Some(me) = self.session.current_user() {
                    commands.push(Command::emit(ClientRequest::Join(me.clone())));
                    commands.push(Command::emit(ClientRequest::GetUsers));
                    if let Some(peer) = &self.selected {
                        commands.extend(open_conversation(me, peer));
                    }
                }
                commands
            }
        }
    }

    pub fn apply(&mut self, commands: Vec<Command>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for command in commands {
            match command {
                Command::SetCurrentUser(user) => {
                    info!(user = %user, "sync: session started");
                    self.session.register(user);
                }
                Command::ResetSession => {
                    info!("sync: session reset");
                    self.session.reset();
                    self.selected = None;
                    self.history_requests.clear();
                    self.presence.clear();
                    self.conversations.clear();
                    self.unread.clear();
                }
                Command::Select(peer) => {
                    debug!(peer = ?peer, "sync: selection changed");
                    self.selected = peer;
                }
                Command::ExpectHistory(peer) => self.history_requests.push_back(peer),
                Command::ForgetHistoryRequests => self.history_requests.clear(),
                Command::ReplaceRoster(users) => {
                    if let Some(me) = self.session.current_user() {
                        self.presence.apply_roster_snapshot(users, me);
                    }
                }
                Command::ReplaceUnread(counts) => {
                    self.unread.replace_all(counts, self.selected.as_ref());
                }
                Command::ResetUnread(peer) => self.unread.reset(&peer),
                Command::IncrementUnread(peer) => {
                    let count = self.unread.increment(&peer, self.selected.as_ref());
                    debug!(peer = %peer, count, "sync: unread incremented");
                }
                Command::AppendMessage { peer, message } => {
                    let outcome = self.conversations.append(&peer, message);
                    debug!(peer = %peer, ?outcome, "sync: message appended");
                }
                Command::AppendPending { peer, message } => {
                    self.conversations.append_pending(&peer, message);
                }
                Command::LoadHistory { peer, messages } => {
                    if let Some(newest) = self.history_requests.iter().rposition(|p| p == &peer) {
                        self.history_requests.drain(..=newest);
                    }
                    let merge = self.conversations.load_history(&peer, messages);
                    debug!(
                        peer = %peer,
                        snapshot_len = merge.snapshot_len,
                        kept_pending = merge.kept_pending,
                        "sync: history loaded"
                    );
                }
                Command::DiscardHistory { answered, reason } => {
                    if let Some(peer) = answered {
                        if let Some(at) = self.history_requests.iter().position(|p| p == &peer) {
                            self.history_requests.remove(at);
                        }
                    }
                    debug!("sync: {reason}");
                }
                Command::Discard(err) => debug!("sync: {err}"),
                Command::MarkPeerRead(peer) => {
                    if let Some(me) = self.session.current_user() {
                        self.conversations.mark_peer_messages_read(me, &peer);
                    }
                }
                Command::SetConnection(state) => self.connection = state,
                Command::Effect(effect) => effects.push(effect),
            }
        }
        effects
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ChatSnapshot {
        let roster = self
            .presence
            .roster()
            .iter()
            .map(|user| RosterEntry {
                unread: self.unread.count(&user.username),
                status: presence::status_label(user, now),
                user: user.clone(),
            })
            .collect();
        let conversation = self
            .selected
            .as_ref()
            .map(|peer| self.conversations.view(peer))
            .unwrap_or_default();

        ChatSnapshot {
            current_user: self.session.current_user().cloned(),
            selected_peer: self.selected.clone(),
            connection: self.connection,
            roster,
            conversation,
            unread: self.unread.snapshot(),
            total_unread: self.unread.total(),
        }
    }
}

/// History request plus read-cursor advance for `peer`, in that order.
fn open_conversation(me: &Username, peer: &Username) -> Vec<Command> {
    vec![
        Command::emit(ClientRequest::GetMessages(HistoryRequest {
            user1: me.clone(),
            user2: peer.clone(),
        })),
        Command::ExpectHistory(peer.clone()),
        Command::emit(ClientRequest::MarkRead(MarkReadRequest {
            reader: me.clone(),
            sender: peer.clone(),
        })),
    ]
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
