//! Emergency proposal records and their derived lifecycle status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, Hash32, NonEmptyString, TxHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(u64);

impl ProposalId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One call the destination plugin performs when the proposal executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAction {
    pub to: Address,
    #[serde(with = "decimal_u128")]
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResource {
    pub name: String,
    pub url: String,
}

/// Human-readable description of a proposal. Encrypted alongside the actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub title: NonEmptyString,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resources: Vec<ProposalResource>,
}

/// Voting parameters fixed when the proposal is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalParameters {
    pub snapshot_block: u64,
    pub expiration_date: DateTime<Utc>,
    pub min_approvals: u16,
}

/// On-chain state of an emergency proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyProposal {
    pub id: ProposalId,
    pub executed: bool,
    pub approvals: u16,
    pub parameters: ProposalParameters,
    pub encrypted_payload_uri: String,
    pub public_metadata_hash: Hash32,
    pub actions_hash: Hash32,
    pub destination_plugin: Address,
}

impl EmergencyProposal {
    #[must_use]
    pub fn required_approvals(&self) -> u16 {
        self.parameters.min_approvals
    }

    #[must_use]
    pub fn expiration_date(&self) -> DateTime<Utc> {
        self.parameters.expiration_date
    }

    /// Expired means the deadline passed without execution. Executed proposals
    /// never expire.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.executed && now > self.parameters.expiration_date
    }

    #[must_use]
    pub fn threshold_reached(&self) -> bool {
        self.approvals >= self.parameters.min_approvals
    }

    #[must_use]
    pub fn status(&self, now: DateTime<Utc>) -> ProposalStatus {
        if self.executed {
            ProposalStatus::Executed
        } else if self.is_expired(now) {
            ProposalStatus::Expired
        } else if self.threshold_reached() {
            ProposalStatus::Approved
        } else {
            ProposalStatus::Submitted
        }
    }
}

/// Lifecycle position of a proposal.
///
/// `Draft` exists only locally, before the creation transaction confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Draft,
    Submitted,
    Approved,
    Executed,
    Expired,
}

impl ProposalStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Expired)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Executed => "executed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub proposal: ProposalId,
    pub approver: Address,
    pub tx: TxHash,
}

mod decimal_u128 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let digits = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(digits).map_err(D::Error::custom)
    }
}
