//! Keccak-256, the hash behind selectors, checksums and transaction ids

use sha3::{Digest, Keccak256};

/// Compute the Keccak-256 digest of `data`
#[inline]
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
