use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::crypto::Address;
use crate::ledger::{RATIO_NEVER_DOWNLOADED, RATIO_SCALE};

/// Upload/download ratio as the gate sees it. `Infinite` is the ledger's
/// never-downloaded sentinel and passes every configured minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Finite(f64),
    Infinite,
}

impl Ratio {
    pub fn from_scaled(scaled: u128) -> Self {
        if scaled == RATIO_NEVER_DOWNLOADED {
            Ratio::Infinite
        } else {
            Ratio::Finite(scaled as f64 / RATIO_SCALE as f64)
        }
    }

    pub fn passes(&self, minimum: f64) -> bool {
        match self {
            Ratio::Infinite => true,
            Ratio::Finite(r) => *r >= minimum,
        }
    }
}

impl std::fmt::Display for Ratio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ratio::Infinite => write!(f, "inf"),
            Ratio::Finite(r) => write!(f, "{:.2}", r),
        }
    }
}

/// Short-TTL cache in front of the ledger's ratio read, keeping the
/// per-announce hot path at one lock and zero I/O. Never persisted.
pub struct RatioCache {
    ttl: Duration,
    entries: Mutex<HashMap<Address, (Ratio, Instant)>>,
}

impl RatioCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Expired entries read as misses and are dropped on the spot.
    pub fn get(&self, identity: &Address) -> Option<Ratio> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(identity) {
            Some((ratio, stored)) if stored.elapsed() < self.ttl => Some(*ratio),
            Some(_) => {
                entries.remove(identity);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, identity: Address, ratio: Ratio) {
        self.entries.lock().unwrap().insert(identity, (ratio, Instant::now()));
    }

    /// Called for both parties after a successful reputation update so the
    /// next announce sees the fresh ratio.
    pub fn invalidate(&self, identity: &Address) {
        self.entries.lock().unwrap().remove(identity);
    }
}
