use std::sync::Arc;
use std::time::Duration;

use crate::cache::RatioCache;
use crate::config::Config;
use crate::crypto::{self, Address, InfoHash, PeerSessionId, SIGNATURE_BYTES};
use crate::error::{GateError, Result};
use crate::gate::{AnnounceEvent, AnnounceGate};
use crate::ledger::{Ledger, TxReceipt};
use crate::metrics::Metrics;
use crate::receipt::{unix_now, Receipt};
use crate::registry::PeerRegistry;
use crate::replay::ReplayGuard;

/// Announce parameters as handed over by the announce-serving library.
#[derive(Debug, Clone, Copy)]
pub struct AnnounceParams {
    pub peer_session_id: PeerSessionId,
    pub event: AnnounceEvent,
}

/// The service facade: owns every shared component and exposes the inbound
/// surface (bind / resolve / submit_receipt / announce). All state except
/// the ledger's lives in memory and is rebuilt from scratch on restart.
pub struct TrackerService {
    registry: Arc<PeerRegistry>,
    replay: Arc<ReplayGuard>,
    cache: Arc<RatioCache>,
    ledger: Arc<dyn Ledger>,
    gate: Arc<AnnounceGate>,
    metrics: Option<Arc<Metrics>>,
}

impl TrackerService {
    pub fn new(cfg: &Config, ledger: Arc<dyn Ledger>) -> Self {
        let registry = Arc::new(PeerRegistry::new());
        let replay = Arc::new(ReplayGuard::new(cfg.receipts.freshness_window_secs));
        let cache = Arc::new(RatioCache::new(Duration::from_secs(cfg.cache.ttl_secs)));
        let gate = Arc::new(AnnounceGate::new(
            registry.clone(),
            ledger.clone(),
            cache.clone(),
            cfg.gate.min_ratio,
        ));
        Self { registry, replay, cache, ledger, gate, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<AnnounceGate> {
        &self.gate
    }

    /// Bind a peer session to an identity. The identity proves control of
    /// its key by personal-signing `proof_message`; a signature recovering
    /// to anyone else is rejected with no state change.
    pub fn bind(
        &self,
        peer: PeerSessionId,
        identity: Address,
        proof_message: &[u8],
        signature: &[u8; SIGNATURE_BYTES],
    ) -> Result<()> {
        let digest = crypto::keccak256(proof_message);
        let recovered = crypto::recover_personal(&digest, signature)?;
        if recovered != identity {
            return Err(GateError::Auth {
                expected: crypto::format_address(&identity),
                recovered: crypto::format_address(&recovered),
            });
        }
        self.registry.bind(peer, identity);
        Ok(())
    }

    pub fn resolve(&self, peer: &PeerSessionId) -> Result<Address> {
        self.registry
            .identity_of(peer)
            .ok_or_else(|| GateError::NotFound("unknown peer id - bind first".into()))
    }

    /// Verify a receipt and commit it to the ledger.
    ///
    /// The replay key is claimed synchronously before the first ledger await,
    /// so two concurrent submissions of one receipt cannot both reach the
    /// ledger. The claim is released only while nothing has committed: a
    /// failure of the first (sender) write keeps the receipt retryable, while
    /// a failure of the second (receiver) write keeps the claim, because the
    /// sender's credit is already on the ledger and a retry would re-apply
    /// it. Validation and signature checks run before the claim and have no
    /// side effects.
    pub async fn submit_receipt(&self, receipt: &Receipt) -> Result<TxReceipt> {
        if receipt.piece_size == 0 {
            self.count_receipt(false);
            return Err(GateError::Validation("piece size must be positive".into()));
        }
        if receipt.sender == receipt.receiver {
            self.count_receipt(false);
            return Err(GateError::Validation(
                "sender and receiver must differ".into(),
            ));
        }
        let now = unix_now();
        if let Err(e) = self.replay.check_fresh(receipt.timestamp, now) {
            self.count_receipt(false);
            return Err(e);
        }

        let recovered = match receipt.recover_signer() {
            Ok(addr) => addr,
            Err(e) => {
                self.count_receipt(false);
                return Err(e);
            }
        };
        if recovered != receipt.receiver {
            self.count_receipt(false);
            return Err(GateError::Auth {
                expected: crypto::format_address(&receipt.receiver),
                recovered: crypto::format_address(&recovered),
            });
        }

        let key = receipt.replay_key();
        if let Err(e) = self.replay.claim(key, now) {
            self.count_receipt(false);
            return Err(e);
        }

        // First write: nothing has committed yet, so releasing the claim is
        // safe and the caller may retry.
        if let Err(e) = self
            .ledger
            .update_reputation(receipt.sender, receipt.piece_size, 0)
            .await
        {
            self.replay.release(&key);
            self.count_receipt(false);
            return Err(e);
        }
        // Second write: the sender's credit is already on the ledger, so the
        // claim must stay. Releasing it here would let a retry re-apply the
        // sender write and double-credit; instead the retry sees Conflict.
        let tx = match self
            .ledger
            .update_reputation(receipt.receiver, 0, receipt.piece_size)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                self.cache.invalidate(&receipt.sender);
                self.count_receipt(false);
                return Err(GateError::Internal(format!(
                    "receiver write failed after sender credit committed: {}",
                    e
                )));
            }
        };

        self.cache.invalidate(&receipt.sender);
        self.cache.invalidate(&receipt.receiver);
        self.count_receipt(true);
        Ok(tx)
    }

    /// Gate decision for one announce; see [`AnnounceGate::announce`].
    pub async fn announce(
        &self,
        infohash: InfoHash,
        params: AnnounceParams,
    ) -> Result<Address> {
        let decision = self.gate.announce(infohash, params.peer_session_id, params.event).await;
        if let Some(m) = &self.metrics {
            match &decision {
                Ok(_) => m.announces_allowed.inc(),
                Err(_) => m.announces_denied.inc(),
            }
        }
        decision
    }

    fn count_receipt(&self, accepted: bool) {
        if let Some(m) = &self.metrics {
            if accepted {
                m.receipts_accepted.inc();
            } else {
                m.receipts_rejected.inc();
            }
        }
    }
}

/// Thin adapter for the announce-serving library's callback boundary: the
/// library calls the returned closure with `(infohash, params, done)` and
/// expects `done(None)` for allow, `done(Some(reason))` for deny. The
/// decision logic itself stays callback-free and directly testable.
pub fn callback_filter(
    service: Arc<TrackerService>,
) -> impl Fn(InfoHash, AnnounceParams, Box<dyn FnOnce(Option<GateError>) + Send>) {
    move |infohash, params, done| {
        let service = service.clone();
        tokio::spawn(async move {
            let decision = service.announce(infohash, params).await;
            done(decision.err());
        });
    }
}
