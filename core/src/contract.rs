//! The emergency proposal contract seam.

use chrono::{DateTime, Utc};
use council_registry::ChainFuture;
use council_types::{Address, EmergencyProposal, Hash32, ProposalAction, ProposalId, TxHash};

/// Everything the contract records when a proposal is created.
///
/// Voting parameters (threshold, expiration) come from the contract settings,
/// not from the creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalSubmission {
    pub encrypted_payload_uri: String,
    pub public_metadata_hash: Hash32,
    pub actions_hash: Hash32,
    pub destination_plugin: Address,
    /// Count the creator's approval in the same transaction.
    pub approve: bool,
}

/// Confirmed creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartReceipt {
    pub id: ProposalId,
    pub tx: TxHash,
    pub expiration_date: DateTime<Utc>,
}

/// Emergency multisig calls. Writes are sent from `caller` and resolve once
/// the transaction is confirmed.
pub trait ProposalContract: Send + Sync {
    fn proposal_count(&self) -> ChainFuture<'_, u64>;
    /// `None` for ids that were never created.
    fn get_proposal(&self, id: ProposalId) -> ChainFuture<'_, Option<EmergencyProposal>>;
    fn has_approved(&self, id: ProposalId, approver: Address) -> ChainFuture<'_, bool>;

    fn start(
        &self,
        caller: Address,
        submission: ProposalSubmission,
    ) -> ChainFuture<'_, StartReceipt>;
    fn approve(&self, caller: Address, id: ProposalId) -> ChainFuture<'_, TxHash>;
    /// The contract re-hashes `actions` against the committed actions hash.
    fn execute(
        &self,
        caller: Address,
        id: ProposalId,
        actions: Vec<ProposalAction>,
    ) -> ChainFuture<'_, TxHash>;
}
