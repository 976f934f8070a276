//! Core domain types for the security council.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod account;
mod bytes;
mod proposal;
mod text;

pub use account::{KeyTarget, SignerAccount};
pub use bytes::{Address, Hash32, HexParseError, PublicKey, TxHash};
pub use proposal::{
    Approval, EmergencyProposal, ProposalAction, ProposalId, ProposalMetadata, ProposalParameters,
    ProposalResource, ProposalStatus,
};
pub use text::{EmptyStringError, NonEmptyString};
