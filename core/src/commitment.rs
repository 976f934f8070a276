//! Hashes committed on-chain at creation and checked after decryption.

use council_crypto::{CodecError, keccak256};
use council_types::{Hash32, ProposalAction, ProposalMetadata};
use serde::{Deserialize, Serialize};

/// Plaintext sealed into the encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalContent {
    pub metadata: ProposalMetadata,
    pub actions: Vec<ProposalAction>,
}

impl ProposalContent {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encryption(e.to_string()))
    }

    /// Parse decrypted bytes. Unparseable plaintext counts as a malformed payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

/// Keccak-256 of the canonical JSON encoding of `actions`.
pub fn actions_hash(actions: &[ProposalAction]) -> Result<Hash32, CodecError> {
    let encoded = serde_json::to_vec(actions).map_err(|e| CodecError::Encryption(e.to_string()))?;
    Ok(keccak256(&encoded))
}

/// Keccak-256 of the canonical JSON encoding of `metadata`.
pub fn metadata_hash(metadata: &ProposalMetadata) -> Result<Hash32, CodecError> {
    let encoded =
        serde_json::to_vec(metadata).map_err(|e| CodecError::Encryption(e.to_string()))?;
    Ok(keccak256(&encoded))
}
