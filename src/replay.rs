use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{GateError, Result};

/// Composite dedup key, see [`crate::receipt::Receipt::replay_key`].
pub type ReplayKey = [u8; 32];

/// Time-windowed receipt dedup with atomic claims.
///
/// A key is claimed synchronously *before* the ledger write starts and
/// released if the write fails, so two in-flight submissions of the same
/// receipt can never both reach the ledger, while a receipt that failed on a
/// transient ledger error can still be retried without being called a
/// duplicate.
pub struct ReplayGuard {
    window_secs: u64,
    seen: Mutex<HashMap<ReplayKey, u64>>,
}

impl ReplayGuard {
    pub fn new(window_secs: u64) -> Self {
        Self { window_secs, seen: Mutex::new(HashMap::new()) }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Reject receipts stamped outside the freshness window in either
    /// direction. Checked before any claim, so a skewed future timestamp
    /// cannot park a permanent entry.
    pub fn check_fresh(&self, timestamp: u64, now: u64) -> Result<()> {
        if timestamp > now + self.window_secs || timestamp + self.window_secs < now {
            return Err(GateError::Validation(format!(
                "stale receipt: timestamp {} outside {}s window of {}",
                timestamp, self.window_secs, now
            )));
        }
        Ok(())
    }

    /// Insert-if-absent. Entries older than the window are pruned lazily on
    /// each claim; no background sweep is needed at this scale.
    pub fn claim(&self, key: ReplayKey, now: u64) -> Result<()> {
        let mut seen = self.seen.lock().unwrap();
        let cutoff = now.saturating_sub(self.window_secs);
        seen.retain(|_, first_seen| *first_seen >= cutoff);
        if seen.contains_key(&key) {
            return Err(GateError::Conflict("receipt already processed".into()));
        }
        seen.insert(key, now);
        Ok(())
    }

    /// Roll back a claim after a failed ledger write.
    pub fn release(&self, key: &ReplayKey) {
        self.seen.lock().unwrap().remove(key);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
