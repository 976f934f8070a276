//! Emergency proposal trust logic for the security council.
//!
//! - `capability`: decision table from registry facts to what an address may do
//! - `session`: the derived keypair of the connected wallet
//! - `monitor`: recomputes capability on invalidation events and broadcasts it
//! - `coordinator`: create, approve, read and execute encrypted proposals
//! - `commitment`: hashes committed on-chain and checked after decryption
//! - `contract`: the emergency proposal contract seam

pub mod capability;
mod commitment;
mod contract;
mod coordinator;
mod error;
mod monitor;
mod session;

pub use capability::{
    CapabilityInputs, CapabilityStatus, Operation, capability_of, classify, resolve_inputs,
};
pub use commitment::{ProposalContent, actions_hash, metadata_hash};
pub use contract::{ProposalContract, ProposalSubmission, StartReceipt};
pub use coordinator::{
    Collaborators, Coordinator, CreatedProposal, DecryptedProposal, ProposalSummary, Recipients,
};
pub use error::{Commitment, CouncilError};
pub use monitor::CapabilityMonitor;
pub use session::SessionContext;
