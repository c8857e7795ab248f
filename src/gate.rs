use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::cache::{Ratio, RatioCache};
use crate::crypto::{self, Address, InfoHash, PeerSessionId};
use crate::error::{GateError, Result};
use crate::ledger::Ledger;
use crate::registry::PeerRegistry;

/// What the announcing client is reporting about this infohash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    Started,
    Stopped,
    Completed,
    /// Periodic re-announce with no lifecycle change.
    Interval,
}

/// The tracker filter: ResolveIdentity -> CheckRegistered -> CheckRatio,
/// run once per incoming announce. Each ledger touch is a suspension point;
/// registry, cache and membership mutations are single short critical
/// sections and safe under interleaving.
pub struct AnnounceGate {
    registry: Arc<PeerRegistry>,
    ledger: Arc<dyn Ledger>,
    cache: Arc<RatioCache>,
    min_ratio: f64,
    swarms: Mutex<HashMap<InfoHash, HashSet<Address>>>,
}

impl AnnounceGate {
    pub fn new(
        registry: Arc<PeerRegistry>,
        ledger: Arc<dyn Ledger>,
        cache: Arc<RatioCache>,
        min_ratio: f64,
    ) -> Self {
        Self { registry, ledger, cache, min_ratio, swarms: Mutex::new(HashMap::new()) }
    }

    /// Allow/deny decision for one announce. `Ok` carries the resolved
    /// identity; every `Err` is a deny with its reason. Swarm membership is
    /// updated exactly once per call whenever the identity resolves,
    /// independent of the final decision.
    pub async fn announce(
        &self,
        infohash: InfoHash,
        peer: PeerSessionId,
        event: AnnounceEvent,
    ) -> Result<Address> {
        // ResolveIdentity
        let identity = self
            .registry
            .identity_of(&peer)
            .ok_or_else(|| GateError::NotFound("unknown peer id - bind first".into()))?;

        self.update_membership(infohash, identity, event);

        // CheckRegistered
        let registered = self.ledger.is_registered(identity).await?;
        if !registered {
            return Err(GateError::NotFound(format!(
                "{} is not registered",
                crypto::format_address(&identity)
            )));
        }

        // CheckRatio
        let ratio = self.cached_ratio(identity).await?;
        if !ratio.passes(self.min_ratio) {
            return Err(self.ratio_deficit(identity, ratio).await);
        }
        Ok(identity)
    }

    /// One cached read on the hot path; the ledger is only touched on miss
    /// or expiry.
    async fn cached_ratio(&self, identity: Address) -> Result<Ratio> {
        if let Some(ratio) = self.cache.get(&identity) {
            return Ok(ratio);
        }
        let scaled = self.ledger.ratio(identity).await?;
        let ratio = Ratio::from_scaled(scaled);
        self.cache.put(identity, ratio);
        Ok(ratio)
    }

    /// Deny path only: re-read the byte counters to phrase the deficit as
    /// "need N more bytes uploaded".
    async fn ratio_deficit(&self, identity: Address, ratio: Ratio) -> GateError {
        let deficit = match self.ledger.reputation(identity).await {
            Ok(rep) => {
                let needed = (self.min_ratio * rep.download_bytes as f64).ceil() as u64;
                needed.saturating_sub(rep.upload_bytes).max(1)
            }
            Err(e) => return e,
        };
        GateError::AccessDenied(format!(
            "insufficient ratio: {} < {:.2}; need {} more bytes uploaded",
            ratio, self.min_ratio, deficit
        ))
    }

    fn update_membership(&self, infohash: InfoHash, identity: Address, event: AnnounceEvent) {
        let mut swarms = self.swarms.lock().unwrap();
        match event {
            AnnounceEvent::Started | AnnounceEvent::Completed | AnnounceEvent::Interval => {
                swarms.entry(infohash).or_default().insert(identity);
            }
            AnnounceEvent::Stopped => {
                if let Some(members) = swarms.get_mut(&infohash) {
                    members.remove(&identity);
                    if members.is_empty() {
                        swarms.remove(&infohash);
                    }
                }
            }
        }
    }

    pub fn swarm_size(&self, infohash: &InfoHash) -> usize {
        self.swarms.lock().unwrap().get(infohash).map(|m| m.len()).unwrap_or(0)
    }

    pub fn min_ratio(&self) -> f64 {
        self.min_ratio
    }
}
