use chrono::{DateTime, Utc};
use council_crypto::{CodecError, KeyError};
use council_registry::{ChainError, RegistryError};
use council_store::StoreError;
use council_types::{Address, Hash32, ProposalId};
use thiserror::Error;

use crate::capability::{CapabilityStatus, Operation};

/// Which on-chain commitment a decrypted payload failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commitment {
    Actions,
    PublicMetadata,
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Actions => "actions hash",
            Self::PublicMetadata => "public metadata hash",
        })
    }
}

#[derive(Debug, Error)]
pub enum CouncilError {
    #[error("the wallet declined the request")]
    UserRejected,
    #[error("signing failed: {0}")]
    SignatureError(String),
    #[error(transparent)]
    RegistryReadError(RegistryError),
    #[error(transparent)]
    RegistryWriteError(RegistryError),
    #[error("{status} does not allow {operation}")]
    CapabilityDenied {
        operation: Operation,
        status: CapabilityStatus,
    },
    #[error("encryption failed: {0}")]
    EncryptionError(#[source] CodecError),
    #[error("decryption failed: {0}")]
    DecryptionFailed(#[source] CodecError),
    #[error("decrypted content does not match the committed {commitment}: expected {expected}, got {actual}")]
    IntegrityViolation {
        commitment: Commitment,
        expected: Hash32,
        actual: Hash32,
    },
    #[error("proposal {id} expired at {expired_at}")]
    ProposalExpired {
        id: ProposalId,
        expired_at: DateTime<Utc>,
    },
    #[error("{approver} already approved proposal {id}")]
    AlreadyApproved { id: ProposalId, approver: Address },
    #[error("proposal {id} has {approvals} of {required} required approvals")]
    ThresholdNotReached {
        id: ProposalId,
        approvals: u16,
        required: u16,
    },
    #[error("no encryption key in the current session")]
    NoSession,
    #[error("proposal {0} does not exist")]
    ProposalNotFound(ProposalId),
    #[error("proposal {0} was already executed")]
    AlreadyExecuted(ProposalId),
    #[error(transparent)]
    StoreError(#[from] StoreError),
    #[error("proposal contract `{operation}` failed: {reason}")]
    ContractError {
        operation: &'static str,
        reason: String,
    },
}

impl CouncilError {
    /// Failures that only end the current call; the session stays usable.
    #[must_use]
    pub fn is_terminal_for_call(&self) -> bool {
        matches!(
            self,
            Self::ProposalExpired { .. } | Self::AlreadyApproved { .. } | Self::AlreadyExecuted(_)
        )
    }

    pub(crate) fn contract(operation: &'static str, err: ChainError) -> Self {
        match err {
            ChainError::Rejected => Self::UserRejected,
            ChainError::Transport(reason) | ChainError::Reverted(reason) => {
                Self::ContractError { operation, reason }
            }
        }
    }
}

impl From<KeyError> for CouncilError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::UserRejected => Self::UserRejected,
            KeyError::SignatureError(reason) => Self::SignatureError(reason),
        }
    }
}

impl From<RegistryError> for CouncilError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Read { .. } => Self::RegistryReadError(err),
            RegistryError::Write { .. } => Self::RegistryWriteError(err),
            RegistryError::Rejected => Self::UserRejected,
        }
    }
}

impl From<CodecError> for CouncilError {
    fn from(err: CodecError) -> Self {
        if err.is_decryption_failure() {
            Self::DecryptionFailed(err)
        } else {
            Self::EncryptionError(err)
        }
    }
}
