//! Signer-side registry records.

use serde::{Deserialize, Serialize};

use crate::{Address, PublicKey};

/// Registry view of one council member.
///
/// `registered_public_key` lives on the owner's record even when it was
/// registered by the appointed agent, so it always belongs to whichever
/// identity decrypts for this owner: the agent if one is appointed, the owner
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerAccount {
    pub owner: Address,
    pub appointed_agent: Option<Address>,
    pub registered_public_key: Option<PublicKey>,
    /// Whether `owner` carries contract code (smart wallet, multisig).
    pub is_contract: bool,
}

impl SignerAccount {
    /// A record with nothing appointed and nothing registered.
    #[must_use]
    pub fn unregistered(owner: Address, is_contract: bool) -> Self {
        Self {
            owner,
            appointed_agent: None,
            registered_public_key: None,
            is_contract,
        }
    }

    #[must_use]
    pub fn has_appointed_agent(&self) -> bool {
        self.appointed_agent.is_some()
    }

    #[must_use]
    pub fn has_registered_key(&self) -> bool {
        self.registered_public_key.is_some()
    }

    /// The address expected to hold the private half of the registered key.
    #[must_use]
    pub fn decryption_identity(&self) -> Address {
        self.appointed_agent.unwrap_or(self.owner)
    }
}

/// Where a freshly derived public key should be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    /// The caller's own owner record.
    Own,
    /// The record of the signer that appointed the caller.
    Appointed,
}
