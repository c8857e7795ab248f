// Library interface for the swarmgate announce service
// This allows tests and external consumers to use the gating pipeline

pub mod config;
pub mod error;
pub mod crypto;
pub mod receipt;
pub mod registry;
pub mod attribution;
pub mod replay;
pub mod ledger;
pub mod cache;
pub mod gate;
pub mod service;
pub mod metrics;

pub use attribution::{Attribution, AttributionEngine, WireView};
pub use cache::{Ratio, RatioCache};
pub use crypto::{Address, InfoHash, PeerSessionId};
pub use error::{GateError, Result};
pub use gate::{AnnounceEvent, AnnounceGate};
pub use ledger::{Ledger, MemoryLedger, Reputation, TxReceipt};
pub use receipt::Receipt;
pub use registry::PeerRegistry;
pub use replay::ReplayGuard;
pub use service::{callback_filter, AnnounceParams, TrackerService};
