//! Keccak-256, the digest the proposal contract commits to.

use council_types::Hash32;
use tiny_keccak::{Hasher, Keccak};

#[must_use]
pub fn keccak256(bytes: &[u8]) -> Hash32 {
    let mut hasher = Keccak::v256();
    hasher.update(bytes);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    Hash32::new(out)
}
