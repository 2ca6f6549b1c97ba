use super::*;
use chrono::{TimeZone, Utc};
use client_core::RosterEntry;
use shared::domain::User;

fn entry(user: User, unread: u32, status: &str) -> RosterEntry {
    RosterEntry {
        user,
        unread,
        status: status.to_string(),
    }
}

#[test]
fn roster_marks_the_open_conversation_and_unread_counts() {
    let snapshot = ChatSnapshot {
        current_user: Some("alice".into()),
        selected_peer: Some("bob".into()),
        roster: vec![
            entry(User::online("bob"), 0, "Online"),
            entry(User::online("carol"), 3, "Online"),
        ],
        ..ChatSnapshot::default()
    };

    assert_eq!(
        roster(&snapshot),
        "> bob (Online)\n  carol (Online) [3 unread]"
    );
    assert_eq!(roster(&ChatSnapshot::default()), "(no other users)");
}

#[test]
fn own_read_messages_show_a_receipt() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 0).unwrap();
    let mut message = Message::new("alice", "bob", "hi", at);
    let alice = Username::from("alice");

    assert_eq!(message_line(&message, Some(&alice)), "[09:05] alice: hi");
    message.read = true;
    assert_eq!(message_line(&message, Some(&alice)), "[09:05] alice: hi (read)");
    assert_eq!(
        message_line(&message, Some(&Username::from("bob"))),
        "[09:05] alice: hi"
    );
}

#[test]
fn status_line_summarizes_session() {
    assert_eq!(status_line(&ChatSnapshot::default()), "signed out [offline]");

    let snapshot = ChatSnapshot {
        current_user: Some("alice".into()),
        selected_peer: Some("bob".into()),
        connection: ConnectionState::Connected,
        total_unread: 2,
        ..ChatSnapshot::default()
    };
    assert_eq!(
        status_line(&snapshot),
        "alice [online] chatting with bob, 2 unread"
    );
}
