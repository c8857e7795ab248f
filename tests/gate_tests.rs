// Announce gate scenarios: resolve -> registered -> ratio, plus the caching
// discipline and swarm membership bookkeeping.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use swarmgate::cache::RatioCache;
use swarmgate::gate::{AnnounceEvent, AnnounceGate};
use swarmgate::ledger::{Ledger, MemoryLedger, Reputation, TxReceipt};
use swarmgate::{Address, PeerRegistry, Result};

/// MemoryLedger wrapper that counts ratio reads, to pin down the cache
/// discipline.
struct CountingLedger {
    inner: MemoryLedger,
    ratio_calls: AtomicU64,
}

impl CountingLedger {
    fn new() -> Self {
        Self { inner: MemoryLedger::new(), ratio_calls: AtomicU64::new(0) }
    }

    fn ratio_calls(&self) -> u64 {
        self.ratio_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for CountingLedger {
    async fn register(&self, identity: Address) -> Result<TxReceipt> {
        self.inner.register(identity).await
    }
    async fn is_registered(&self, identity: Address) -> Result<bool> {
        self.inner.is_registered(identity).await
    }
    async fn reputation(&self, identity: Address) -> Result<Reputation> {
        self.inner.reputation(identity).await
    }
    async fn ratio(&self, identity: Address) -> Result<u128> {
        self.ratio_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ratio(identity).await
    }
    async fn update_reputation(
        &self,
        identity: Address,
        upload_delta: u64,
        download_delta: u64,
    ) -> Result<TxReceipt> {
        self.inner.update_reputation(identity, upload_delta, download_delta).await
    }
}

const PEER: [u8; 20] = [1u8; 20];
const ID: [u8; 20] = [0xaau8; 20];
const HASH: [u8; 32] = [0x33u8; 32];

fn gate_over(ledger: Arc<dyn Ledger>, ttl_secs: u64, min_ratio: f64) -> (AnnounceGate, Arc<PeerRegistry>) {
    let registry = Arc::new(PeerRegistry::new());
    let cache = Arc::new(RatioCache::new(Duration::from_secs(ttl_secs)));
    (AnnounceGate::new(registry.clone(), ledger, cache, min_ratio), registry)
}

#[tokio::test]
async fn unbound_peer_is_denied_before_any_ledger_touch() {
    let (gate, _registry) = gate_over(Arc::new(CountingLedger::new()), 30, 0.5);
    let err = gate.announce(HASH, PEER, AnnounceEvent::Started).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(err.to_string().contains("bind first"));
}

#[tokio::test]
async fn unregistered_identity_is_denied() {
    let (gate, registry) = gate_over(Arc::new(CountingLedger::new()), 30, 0.5);
    registry.bind(PEER, ID);
    let err = gate.announce(HASH, PEER, AnnounceEvent::Started).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(err.to_string().contains("not registered"));
}

#[tokio::test]
async fn low_ratio_is_denied_with_a_deficit_message() {
    let ledger = Arc::new(CountingLedger::new());
    ledger.register(ID).await.unwrap();
    // 8 up / 100 down = 0.08, against a 0.5 minimum: 42 bytes short.
    ledger.update_reputation(ID, 8, 100).await.unwrap();

    let (gate, registry) = gate_over(ledger, 30, 0.5);
    registry.bind(PEER, ID);

    let err = gate.announce(HASH, PEER, AnnounceEvent::Started).await.unwrap_err();
    assert_eq!(err.kind(), "access_denied");
    let msg = err.to_string();
    assert!(msg.contains("0.08 < 0.50"), "unexpected message: {}", msg);
    assert!(msg.contains("need 42 more bytes uploaded"), "unexpected message: {}", msg);
}

#[tokio::test]
async fn never_downloaded_identity_always_passes() {
    let ledger = Arc::new(CountingLedger::new());
    ledger.register(ID).await.unwrap();
    ledger.update_reputation(ID, 1, 0).await.unwrap();

    let (gate, registry) = gate_over(ledger, 30, f64::MAX);
    registry.bind(PEER, ID);

    assert_eq!(gate.announce(HASH, PEER, AnnounceEvent::Started).await.unwrap(), ID);
}

#[tokio::test]
async fn ratio_reads_within_ttl_hit_the_cache() {
    let ledger = Arc::new(CountingLedger::new());
    ledger.register(ID).await.unwrap();
    ledger.update_reputation(ID, 900, 100).await.unwrap();

    let counting = ledger.clone();
    let (gate, registry) = gate_over(ledger, 30, 0.5);
    registry.bind(PEER, ID);

    gate.announce(HASH, PEER, AnnounceEvent::Started).await.unwrap();
    gate.announce(HASH, PEER, AnnounceEvent::Interval).await.unwrap();
    assert_eq!(counting.ratio_calls(), 1);
}

#[tokio::test]
async fn expired_cache_entry_triggers_exactly_one_fresh_read() {
    let ledger = Arc::new(CountingLedger::new());
    ledger.register(ID).await.unwrap();
    ledger.update_reputation(ID, 900, 100).await.unwrap();

    let counting = ledger.clone();
    // Zero TTL: every announce is a cache miss.
    let (gate, registry) = gate_over(ledger, 0, 0.5);
    registry.bind(PEER, ID);

    gate.announce(HASH, PEER, AnnounceEvent::Started).await.unwrap();
    assert_eq!(counting.ratio_calls(), 1);
    gate.announce(HASH, PEER, AnnounceEvent::Interval).await.unwrap();
    assert_eq!(counting.ratio_calls(), 2);
}

#[tokio::test]
async fn membership_is_tracked_even_when_the_gate_denies() {
    let ledger = Arc::new(CountingLedger::new());
    ledger.register(ID).await.unwrap();
    ledger.update_reputation(ID, 8, 100).await.unwrap();

    let (gate, registry) = gate_over(ledger, 30, 0.5);
    registry.bind(PEER, ID);

    // Denied on ratio, yet the started event still lands in the swarm set.
    assert!(gate.announce(HASH, PEER, AnnounceEvent::Started).await.is_err());
    assert_eq!(gate.swarm_size(&HASH), 1);

    assert!(gate.announce(HASH, PEER, AnnounceEvent::Stopped).await.is_err());
    assert_eq!(gate.swarm_size(&HASH), 0);
}

#[tokio::test]
async fn membership_is_scoped_per_infohash() {
    let ledger = Arc::new(CountingLedger::new());
    ledger.register(ID).await.unwrap();

    let (gate, registry) = gate_over(ledger, 30, 0.5);
    registry.bind(PEER, ID);

    let other: [u8; 32] = [0x44u8; 32];
    gate.announce(HASH, PEER, AnnounceEvent::Started).await.unwrap();
    assert_eq!(gate.swarm_size(&HASH), 1);
    assert_eq!(gate.swarm_size(&other), 0);

    gate.announce(other, PEER, AnnounceEvent::Completed).await.unwrap();
    assert_eq!(gate.swarm_size(&other), 1);

    gate.announce(HASH, PEER, AnnounceEvent::Stopped).await.unwrap();
    assert_eq!(gate.swarm_size(&HASH), 0);
    assert_eq!(gate.swarm_size(&other), 1);
}
