use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::crypto::{self, Address};
use crate::error::{GateError, Result};
use crate::receipt::unix_now;

/// Ratio fixed-point scale: 1e18, matching the on-chain representation.
pub const RATIO_SCALE: u128 = 1_000_000_000_000_000_000;

/// Sentinel ratio for an identity that has never downloaded anything.
pub const RATIO_NEVER_DOWNLOADED: u128 = u128::MAX;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reputation {
    pub upload_bytes: u64,
    pub download_bytes: u64,
    pub last_updated: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: [u8; 32],
}

/// The authoritative reputation store. Registration, counters and the scaled
/// ratio live here; the service keeps no local reputation state at all and
/// survives restarts with nothing to recover.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// `Conflict` when the identity is already registered.
    async fn register(&self, identity: Address) -> Result<TxReceipt>;
    async fn is_registered(&self, identity: Address) -> Result<bool>;
    async fn reputation(&self, identity: Address) -> Result<Reputation>;
    /// Scaled 1e18 fixed-point ratio; [`RATIO_NEVER_DOWNLOADED`] when the
    /// identity has no download bytes.
    async fn ratio(&self, identity: Address) -> Result<u128>;
    async fn update_reputation(
        &self,
        identity: Address,
        upload_delta: u64,
        download_delta: u64,
    ) -> Result<TxReceipt>;
}

pub fn scaled_ratio(rep: &Reputation) -> u128 {
    if rep.download_bytes == 0 {
        return RATIO_NEVER_DOWNLOADED;
    }
    (rep.upload_bytes as u128) * RATIO_SCALE / (rep.download_bytes as u128)
}

/// In-memory ledger used by the binary shell and the test suite. Supports
/// single-hop referrer delegation: an identity missing locally is read once
/// from the predecessor instance and migrated in, after which all reads and
/// writes are local.
#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<Address, Reputation>>,
    referrer: Option<Arc<MemoryLedger>>,
    nonce: AtomicU64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A successor instance that reads through `referrer` on local misses.
    pub fn with_referrer(referrer: Arc<MemoryLedger>) -> Self {
        Self { referrer: Some(referrer), ..Self::default() }
    }

    fn tx_receipt(&self, identity: &Address) -> TxReceipt {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let mut buf = Vec::with_capacity(28);
        buf.extend_from_slice(identity);
        buf.extend_from_slice(&nonce.to_be_bytes());
        TxReceipt { tx_hash: crypto::keccak256(&buf) }
    }

    /// Local lookup, migrating from the referrer on first touch. Exactly one
    /// hop: the referrer's own referrer is never consulted.
    fn load(&self, identity: &Address) -> Option<Reputation> {
        if let Some(rep) = self.entries.lock().unwrap().get(identity) {
            return Some(*rep);
        }
        let referrer = self.referrer.as_ref()?;
        let inherited = *referrer.entries.lock().unwrap().get(identity)?;
        self.entries.lock().unwrap().insert(*identity, inherited);
        Some(inherited)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn register(&self, identity: Address) -> Result<TxReceipt> {
        if self.load(&identity).is_some() {
            return Err(GateError::Conflict(format!(
                "{} is already registered",
                crypto::format_address(&identity)
            )));
        }
        self.entries.lock().unwrap().insert(
            identity,
            Reputation { last_updated: unix_now(), ..Reputation::default() },
        );
        Ok(self.tx_receipt(&identity))
    }

    async fn is_registered(&self, identity: Address) -> Result<bool> {
        Ok(self.load(&identity).is_some())
    }

    async fn reputation(&self, identity: Address) -> Result<Reputation> {
        self.load(&identity).ok_or_else(|| {
            GateError::NotFound(format!("{} is not registered", crypto::format_address(&identity)))
        })
    }

    async fn ratio(&self, identity: Address) -> Result<u128> {
        Ok(scaled_ratio(&self.reputation(identity).await?))
    }

    async fn update_reputation(
        &self,
        identity: Address,
        upload_delta: u64,
        download_delta: u64,
    ) -> Result<TxReceipt> {
        // Touch through the referrer first so the update lands on a migrated copy.
        self.reputation(identity).await?;
        let mut entries = self.entries.lock().unwrap();
        let rep = entries.entry(identity).or_default();
        rep.upload_bytes = rep.upload_bytes.saturating_add(upload_delta);
        rep.download_bytes = rep.download_bytes.saturating_add(download_delta);
        rep.last_updated = unix_now();
        drop(entries);
        Ok(self.tx_receipt(&identity))
    }
}
