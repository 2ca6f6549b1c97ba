//! Client-side synchronization core for one-to-one chat.
//!
//! [`sync::SyncCore`] owns the session and the three stores (presence,
//! conversations, unread) and decides how every inbound event and local
//! action changes them. [`ChatClient`] wires it to a [`transport::Transport`]
//! and publishes [`ChatSnapshot`]s for whatever renders the UI.

pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod identity;
pub mod notify;
pub mod presence;
pub mod session;
pub mod snapshot;
pub mod sync;
pub mod transport;
pub mod unread;

pub use client::{ChatClient, ClientEvent};
pub use config::{load_settings, ClientSettings};
pub use error::SyncError;
pub use identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use notify::{Notifier, RecordingNotifier, TracingNotifier};
pub use snapshot::{ChatSnapshot, RosterEntry};
pub use sync::{Effect, LocalAction, Notification, SyncCore, SyncSettings};
pub use transport::{MemoryTransport, Transport, WebSocketTransport};
