use client_core::{transport::ConnectionState, ChatSnapshot};
use shared::domain::{Message, Username};

pub fn roster(snapshot: &ChatSnapshot) -> String {
    if snapshot.roster.is_empty() {
        return "(no other users)".to_string();
    }
    snapshot
        .roster
        .iter()
        .map(|entry| {
            let marker = if snapshot.selected_peer.as_ref() == Some(&entry.user.username) {
                '>'
            } else {
                ' '
            };
            let mut line = format!("{marker} {} ({})", entry.user.username, entry.status);
            if entry.unread > 0 {
                line.push_str(&format!(" [{} unread]", entry.unread));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn message_line(message: &Message, me: Option<&Username>) -> String {
    let time = message.timestamp.format("%H:%M");
    let mine = me == Some(&message.sender);
    let receipt = if mine && message.read { " (read)" } else { "" };
    format!("[{time}] {}: {}{receipt}", message.sender, message.text)
}

pub fn status_line(snapshot: &ChatSnapshot) -> String {
    let user = snapshot
        .current_user
        .as_ref()
        .map_or("signed out", Username::as_str);
    let connection = match snapshot.connection {
        ConnectionState::Connected => "online",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Disconnected => "offline",
    };
    let mut line = format!("{user} [{connection}]");
    if let Some(peer) = &snapshot.selected_peer {
        line.push_str(&format!(" chatting with {peer}"));
    }
    if snapshot.total_unread > 0 {
        line.push_str(&format!(", {} unread", snapshot.total_unread));
    }
    line
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
