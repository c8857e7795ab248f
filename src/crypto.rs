use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::error::{GateError, Result};

/// A 20-byte chain address, the stable identity reputation is tracked against.
pub type Address = [u8; 20];

/// Ephemeral per-connection identifier issued by the announce-serving library.
pub type PeerSessionId = [u8; 20];

/// 32-byte content identifier. Legacy 20-byte ids are left-zero-padded.
pub type InfoHash = [u8; 32];

/// Recoverable secp256k1 signature, `r || s || v` with an Ethereum-style v.
pub const SIGNATURE_BYTES: usize = 65;

const PERSONAL_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Domain-prefix a 32-byte digest so the resulting signature can never be
/// replayed as a raw-transaction signature.
pub fn personal_message_hash(digest: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_PREFIX);
    hasher.update(digest);
    hasher.finalize().into()
}

/// Sign a canonical digest under the personal-message scheme.
pub fn sign_personal(key: &SigningKey, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_BYTES]> {
    let prefixed = personal_message_hash(digest);
    let (sig, recid) = key
        .sign_prehash_recoverable(&prefixed)
        .map_err(|e| GateError::Internal(format!("signing failed: {}", e)))?;
    let mut out = [0u8; SIGNATURE_BYTES];
    out[..64].copy_from_slice(sig.to_bytes().as_slice());
    out[64] = recid.to_byte() + 27;
    Ok(out)
}

/// Recover the signing address from a personal-message signature over `digest`.
/// A wrong signer is not detected here; the caller must compare the returned
/// address against whoever was supposed to sign.
pub fn recover_personal(digest: &[u8; 32], signature: &[u8; SIGNATURE_BYTES]) -> Result<Address> {
    let prefixed = personal_message_hash(digest);
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|_| GateError::Validation("malformed signature r/s".into()))?;
    let v = signature[64];
    let recid_byte = if v >= 27 { v - 27 } else { v };
    let recid = RecoveryId::from_byte(recid_byte)
        .ok_or_else(|| GateError::Validation(format!("invalid recovery id {}", v)))?;
    let vk = VerifyingKey::recover_from_prehash(&prefixed, &sig, recid)
        .map_err(|_| GateError::Validation("signature recovery failed".into()))?;
    Ok(address_of(&vk))
}

/// Derive the chain address: last 20 bytes of keccak256 over the
/// uncompressed public key (sans the 0x04 tag byte).
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    addr
}

pub fn address_of_signer(key: &SigningKey) -> Address {
    address_of(key.verifying_key())
}

/// Parse a hex address, case-insensitively, with or without a 0x prefix.
pub fn parse_address(s: &str) -> Result<Address> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw)
        .map_err(|_| GateError::Validation(format!("invalid hex address '{}'", s)))?;
    bytes
        .try_into()
        .map_err(|_| GateError::Validation(format!("address '{}' is not 20 bytes", s)))
}

pub fn format_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Accept both 32-byte content ids and legacy 20-byte ids, left-zero-padded.
pub fn parse_infohash(bytes: &[u8]) -> Result<InfoHash> {
    match bytes.len() {
        32 => {
            let mut out = [0u8; 32];
            out.copy_from_slice(bytes);
            Ok(out)
        }
        20 => {
            let mut out = [0u8; 32];
            out[12..].copy_from_slice(bytes);
            Ok(out)
        }
        n => Err(GateError::Validation(format!(
            "infohash must be 20 or 32 bytes, got {}",
            n
        ))),
    }
}
