use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::{self, Address, InfoHash, SIGNATURE_BYTES};
use crate::error::{GateError, Result};

/// A signed attestation that `receiver` got one verified piece from `sender`.
/// Signed by the receiving side only; the sender never touches it. Immutable
/// once signed: flipping any field changes the recovered signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub infohash: InfoHash,
    pub sender: Address,
    pub receiver: Address,
    pub piece_hash: [u8; 32],
    pub piece_index: u64,
    pub piece_size: u64,
    /// Unix seconds at signing time.
    pub timestamp: u64,
    #[serde(with = "BigArray")]
    pub signature: [u8; SIGNATURE_BYTES],
}

fn push_u64_as_u256(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&[0u8; 24]);
    buf.extend_from_slice(&v.to_be_bytes());
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Receipt {
    /// Build and sign a receipt for a freshly verified piece. `signer` must be
    /// the receiver's key; the receiver address is derived from it.
    pub fn generate(
        signer: &SigningKey,
        infohash: InfoHash,
        sender: Address,
        piece_index: u64,
        piece_bytes: &[u8],
        declared_size: u64,
    ) -> Result<Receipt> {
        if declared_size == 0 {
            return Err(GateError::Validation("piece size must be positive".into()));
        }
        let receiver = crypto::address_of_signer(signer);
        let mut receipt = Receipt {
            infohash,
            sender,
            receiver,
            piece_hash: crypto::keccak256(piece_bytes),
            piece_index,
            piece_size: declared_size,
            timestamp: unix_now(),
            signature: [0u8; SIGNATURE_BYTES],
        };
        receipt.signature = crypto::sign_personal(signer, &receipt.canonical_hash())?;
        Ok(receipt)
    }

    /// Canonical digest over all fields except the signature. Fields are
    /// packed fixed-width in a fixed order (integers as 32-byte big-endian),
    /// so no length prefixing is needed.
    pub fn canonical_hash(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(32 + 20 + 20 + 32 + 32 * 3);
        buf.extend_from_slice(&self.infohash);
        buf.extend_from_slice(&self.sender);
        buf.extend_from_slice(&self.receiver);
        buf.extend_from_slice(&self.piece_hash);
        push_u64_as_u256(&mut buf, self.piece_index);
        push_u64_as_u256(&mut buf, self.piece_size);
        push_u64_as_u256(&mut buf, self.timestamp);
        crypto::keccak256(&buf)
    }

    /// Recover whoever signed the canonical hash. A forged or mutated receipt
    /// yields a different address rather than an error, so the caller must
    /// compare the result against `self.receiver`.
    pub fn recover_signer(&self) -> Result<Address> {
        crypto::recover_personal(&self.canonical_hash(), &self.signature)
    }

    /// Dedup key for the replay guard: keccak over the composite
    /// receiver / infohash / piece index / timestamp, fixed-width packed.
    pub fn replay_key(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(20 + 32 + 32 * 2);
        buf.extend_from_slice(&self.receiver);
        buf.extend_from_slice(&self.infohash);
        push_u64_as_u256(&mut buf, self.piece_index);
        push_u64_as_u256(&mut buf, self.timestamp);
        crypto::keccak256(&buf)
    }
}
