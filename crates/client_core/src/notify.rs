use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::sync::Notification;

/// Side channel for "new message" alerts (sound, desktop toast, ...).
/// Called outside the core lock, once per accepted inbound message.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        info!(
            from = %notification.from,
            unread = notification.unread,
            "notify: {}",
            notification.preview
        );
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
    }
}
