use super::*;
use chrono::{DateTime, Duration, TimeZone, Utc};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(seconds)
}

fn msg(sender: &str, receiver: &str, text: &str, seconds: i64) -> Message {
    Message::new(sender, receiver, text, at(seconds))
}

fn texts(store: &ConversationStore, peer: &Username) -> Vec<String> {
    store.view(peer).into_iter().map(|m| m.text).collect()
}

#[test]
fn redelivered_message_is_stored_once() {
    let mut store = ConversationStore::new();
    let bob = Username::from("bob");
    let message = msg("bob", "alice", "hi", 0);

    assert_eq!(store.append(&bob, message.clone()), AppendOutcome::Inserted);
    for _ in 0..5 {
        assert_eq!(store.append(&bob, message.clone()), AppendOutcome::Duplicate);
    }

    assert_eq!(store.len(&bob), 1);
}

#[test]
fn same_timestamp_different_direction_is_a_distinct_message() {
    let mut store = ConversationStore::new();
    let bob = Username::from("bob");
    store.append(&bob, msg("bob", "alice", "ping", 0));
    store.append(&bob, msg("alice", "bob", "pong", 0));

    assert_eq!(store.len(&bob), 2);
}

#[test]
fn log_is_ordered_by_timestamp_with_arrival_order_on_ties() {
    let mut store = ConversationStore::new();
    let bob = Username::from("bob");
    store.append(&bob, msg("bob", "alice", "third", 30));
    store.append(&bob, msg("bob", "alice", "first", 10));
    store.append(&bob, msg("alice", "bob", "tie-a", 20));
    store.append(&bob, msg("bob", "alice", "tie-b", 20));

    assert_eq!(texts(&store, &bob), vec!["first", "tie-a", "tie-b", "third"]);
}

#[test]
fn logs_are_kept_per_peer() {
    let mut store = ConversationStore::new();
    let bob = Username::from("bob");
    let carol = Username::from("carol");
    store.append(&bob, msg("bob", "alice", "from bob", 0));
    store.append(&carol, msg("carol", "alice", "from carol", 1));

    assert_eq!(texts(&store, &bob), vec!["from bob"]);
    assert_eq!(texts(&store, &carol), vec!["from carol"]);
    assert!(store.view(&Username::from("dave")).is_empty());
}

#[test]
fn mark_read_only_touches_local_users_outbound_messages_to_that_peer() {
    let mut store = ConversationStore::new();
    let alice = Username::from("alice");
    let bob = Username::from("bob");
    store.append(&bob, msg("alice", "bob", "out-1", 0));
    store.append(&bob, msg("bob", "alice", "in-1", 1));
    store.append(&bob, msg("alice", "bob", "out-2", 2));

    assert_eq!(store.mark_peer_messages_read(&alice, &bob), 2);
    assert_eq!(store.mark_peer_messages_read(&alice, &bob), 0);

    let view = store.view(&bob);
    assert!(view[0].read);
    assert!(!view[1].read);
    assert!(view[2].read);
}

#[test]
fn history_snapshot_replaces_delivered_messages() {
    let mut store = ConversationStore::new();
    let bob = Username::from("bob");
    store.append(&bob, msg("bob", "alice", "old", 0));

    let merge = store.load_history(
        &bob,
        vec![msg("bob", "alice", "a", 5), msg("alice", "bob", "b", 6)],
    );

    assert_eq!(merge.snapshot_len, 2);
    assert_eq!(merge.kept_pending, 0);
    assert_eq!(texts(&store, &bob), vec!["a", "b"]);
}

#[test]
fn history_snapshot_keeps_pending_sends_it_does_not_know_about() {
    let mut store = ConversationStore::new();
    let bob = Username::from("bob");
    store.append_pending(&bob, msg("alice", "bob", "in flight", 9));
    store.append_pending(&bob, msg("alice", "bob", "acked", 4));

    let merge = store.load_history(
        &bob,
        vec![msg("bob", "alice", "hello", 1), msg("alice", "bob", "acked", 4)],
    );

    assert_eq!(merge.kept_pending, 1);
    assert_eq!(texts(&store, &bob), vec!["hello", "acked", "in flight"]);
    let log = store.log(&bob).expect("log");
    assert!(!log.is_pending(&msg("alice", "bob", "acked", 4).key()));
    assert!(log.is_pending(&msg("alice", "bob", "in flight", 9).key()));
}

#[test]
fn history_snapshot_never_clears_a_read_flag() {
    let mut store = ConversationStore::new();
    let alice = Username::from("alice");
    let bob = Username::from("bob");
    store.append(&bob, msg("alice", "bob", "seen", 0));
    store.mark_peer_messages_read(&alice, &bob);

    store.load_history(&bob, vec![msg("alice", "bob", "seen", 0)]);

    assert!(store.view(&bob)[0].read);
}

#[test]
fn echo_confirms_a_pending_send_instead_of_duplicating_it() {
    let mut store = ConversationStore::new();
    let bob = Username::from("bob");
    let sent = msg("alice", "bob", "hi", 0);

    assert_eq!(store.append_pending(&bob, sent.clone()), AppendOutcome::Inserted);
    assert_eq!(store.pending_count(&bob), 1);
    assert_eq!(store.append(&bob, sent.clone()), AppendOutcome::Confirmed);
    assert_eq!(store.append(&bob, sent), AppendOutcome::Duplicate);

    assert_eq!(store.len(&bob), 1);
    assert_eq!(store.pending_count(&bob), 0);
}

#[test]
fn duplicate_delivery_can_raise_but_not_lower_read() {
    let mut store = ConversationStore::new();
    let bob = Username::from("bob");
    let mut read_copy = msg("alice", "bob", "x", 0);
    read_copy.read = true;

    store.append(&bob, msg("alice", "bob", "x", 0));
    store.append(&bob, read_copy);
    assert!(store.view(&bob)[0].read);

    store.append(&bob, msg("alice", "bob", "x", 0));
    assert!(store.view(&bob)[0].read);
}
