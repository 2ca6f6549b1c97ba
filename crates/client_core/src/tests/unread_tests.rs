use super::*;

#[test]
fn increment_counts_inactive_peers_and_pins_the_active_one() {
    let mut ledger = UnreadLedger::new();
    let bob = Username::from("bob");
    let carol = Username::from("carol");

    assert_eq!(ledger.increment(&bob, None), 1);
    assert_eq!(ledger.increment(&bob, Some(&carol)), 2);
    assert_eq!(ledger.increment(&carol, Some(&carol)), 0);

    assert_eq!(ledger.count(&bob), 2);
    assert_eq!(ledger.count(&carol), 0);
    assert_eq!(ledger.total(), 2);
}

#[test]
fn reset_zeroes_a_single_peer() {
    let mut ledger = UnreadLedger::new();
    let bob = Username::from("bob");
    let carol = Username::from("carol");
    ledger.increment(&bob, None);
    ledger.increment(&carol, None);

    ledger.reset(&bob);

    assert_eq!(ledger.count(&bob), 0);
    assert_eq!(ledger.count(&carol), 1);
}

#[test]
fn replace_all_takes_server_counts_but_keeps_active_peer_at_zero() {
    let mut ledger = UnreadLedger::new();
    let bob = Username::from("bob");
    ledger.increment(&Username::from("stale"), None);

    let counts = HashMap::from([
        (Username::from("bob"), 4),
        (Username::from("carol"), 2),
    ]);
    ledger.replace_all(counts, Some(&bob));

    assert_eq!(ledger.count(&bob), 0);
    assert_eq!(ledger.count(&Username::from("carol")), 2);
    assert_eq!(ledger.count(&Username::from("stale")), 0);
    assert_eq!(ledger.total(), 2);
}

#[test]
fn snapshot_lists_only_nonzero_counts_in_name_order() {
    let mut ledger = UnreadLedger::new();
    ledger.increment(&Username::from("zed"), None);
    ledger.increment(&Username::from("amy"), None);
    ledger.reset(&Username::from("bob"));

    let snapshot = ledger.snapshot();

    assert_eq!(
        snapshot.keys().map(Username::as_str).collect::<Vec<_>>(),
        vec!["amy", "zed"]
    );
}

#[test]
fn clear_forgets_everything() {
    let mut ledger = UnreadLedger::new();
    ledger.increment(&Username::from("bob"), None);
    ledger.clear();
    assert_eq!(ledger.total(), 0);
    assert!(ledger.snapshot().is_empty());
}
