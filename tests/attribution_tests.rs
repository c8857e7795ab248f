// Piece attribution: byte-delta snapshots over connected wires, with the
// documented fallbacks for lone peers and unattributable events.

use swarmgate::{AttributionEngine, WireView};

fn wire(id: u8, downloaded: u64) -> WireView {
    WireView { peer_session_id: Some([id; 20]), downloaded }
}

#[test]
fn largest_delta_wins() {
    let mut engine = AttributionEngine::new();
    engine.snapshot(&[wire(1, 0), wire(2, 0)]);

    let hit = engine.attribute(&[wire(1, 1000), wire(2, 5000)]).unwrap();
    assert_eq!(hit.peer_session_id, [2u8; 20]);
    assert_eq!(hit.delta, 5000);
}

#[test]
fn lone_wire_with_zero_delta_gets_the_credit() {
    let mut engine = AttributionEngine::new();
    engine.snapshot(&[wire(1, 700)]);

    let hit = engine.attribute(&[wire(1, 700)]).unwrap();
    assert_eq!(hit.peer_session_id, [1u8; 20]);
    assert_eq!(hit.delta, 0);
}

#[test]
fn multiple_wires_with_zero_delta_are_unattributable() {
    let mut engine = AttributionEngine::new();
    engine.snapshot(&[wire(1, 100), wire(2, 200)]);
    assert!(engine.attribute(&[wire(1, 100), wire(2, 200)]).is_none());
}

#[test]
fn no_wires_means_no_attribution() {
    let mut engine = AttributionEngine::new();
    assert!(engine.attribute(&[]).is_none());
}

#[test]
fn snapshot_advances_after_each_attribution() {
    let mut engine = AttributionEngine::new();
    engine.snapshot(&[wire(1, 0), wire(2, 0)]);

    let first = engine.attribute(&[wire(1, 4000), wire(2, 100)]).unwrap();
    assert_eq!(first.peer_session_id, [1u8; 20]);
    assert_eq!(first.delta, 4000);

    // Deltas are measured from the previous cycle, not from session start.
    let second = engine.attribute(&[wire(1, 4100), wire(2, 2100)]).unwrap();
    assert_eq!(second.peer_session_id, [2u8; 20]);
    assert_eq!(second.delta, 2000);
}

#[test]
fn unseen_wire_counts_from_zero() {
    let mut engine = AttributionEngine::new();
    engine.snapshot(&[wire(1, 500)]);

    // Wire 2 joined after the snapshot; its whole counter is the delta.
    let hit = engine.attribute(&[wire(1, 600), wire(2, 900)]).unwrap();
    assert_eq!(hit.peer_session_id, [2u8; 20]);
    assert_eq!(hit.delta, 900);
}

#[test]
fn equal_positive_deltas_tie_break_to_lowest_session_id() {
    let mut engine = AttributionEngine::new();
    engine.snapshot(&[wire(7, 0), wire(4, 0), wire(9, 0)]);

    let hit = engine.attribute(&[wire(7, 300), wire(4, 300), wire(9, 300)]).unwrap();
    assert_eq!(hit.peer_session_id, [4u8; 20]);
    assert_eq!(hit.delta, 300);
}

#[test]
fn wires_without_session_ids_never_win() {
    let mut engine = AttributionEngine::new();
    let anon = WireView { peer_session_id: None, downloaded: 0 };
    engine.snapshot(&[anon.clone(), wire(1, 0)]);

    let busy_anon = WireView { peer_session_id: None, downloaded: 90000 };
    let hit = engine.attribute(&[busy_anon, wire(1, 10)]).unwrap();
    assert_eq!(hit.peer_session_id, [1u8; 20]);
    assert_eq!(hit.delta, 10);
}
