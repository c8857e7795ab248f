use std::collections::HashMap;

use crate::crypto::PeerSessionId;

/// Read-only view of one open connection, as exposed by the swarm client.
/// Connections that have not completed the handshake carry no session id and
/// are never attribution candidates.
#[derive(Debug, Clone)]
pub struct WireView {
    pub peer_session_id: Option<PeerSessionId>,
    pub downloaded: u64,
}

/// The peer a verified piece is credited to, with the byte delta observed
/// since the previous attribution cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub peer_session_id: PeerSessionId,
    pub delta: u64,
}

/// Best-effort mapping from "piece verified" events to the sending peer via
/// per-connection downloaded-byte snapshots. Heuristic, not a proof: a piece
/// is credited to the connection that moved the most bytes since the last
/// cycle.
#[derive(Default)]
pub struct AttributionEngine {
    snapshots: HashMap<PeerSessionId, u64>,
}

impl AttributionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record current counters so the next piece's deltas are measured from
    /// here rather than from session start.
    pub fn snapshot(&mut self, wires: &[WireView]) {
        self.snapshots.clear();
        for wire in wires {
            if let Some(peer) = wire.peer_session_id {
                self.snapshots.insert(peer, wire.downloaded);
            }
        }
    }

    /// Pick the most likely sender of the piece that just verified.
    ///
    /// The strict maximum positive delta wins; equal positive deltas
    /// tie-break to the lowest session id so the result never depends on
    /// iteration order. With no positive delta and exactly one candidate
    /// wire, that lone peer is the only possible source and gets the credit.
    /// Otherwise the event is unattributable and dropped. The snapshot
    /// always advances afterwards.
    pub fn attribute(&mut self, wires: &[WireView]) -> Option<Attribution> {
        let mut best: Option<Attribution> = None;
        let mut candidates = 0usize;
        let mut lone: Option<PeerSessionId> = None;

        for wire in wires {
            let peer = match wire.peer_session_id {
                Some(p) => p,
                None => continue,
            };
            candidates += 1;
            lone = Some(peer);
            let base = self.snapshots.get(&peer).copied().unwrap_or(0);
            let delta = wire.downloaded.saturating_sub(base);
            if delta == 0 {
                continue;
            }
            let better = match &best {
                None => true,
                Some(b) => delta > b.delta || (delta == b.delta && peer < b.peer_session_id),
            };
            if better {
                best = Some(Attribution { peer_session_id: peer, delta });
            }
        }

        if best.is_none() && candidates == 1 {
            best = lone.map(|peer| Attribution { peer_session_id: peer, delta: 0 });
        }

        self.snapshot(wires);
        best
    }
}
