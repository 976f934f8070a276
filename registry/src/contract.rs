//! The remote registry contract, as seen from this side of the RPC boundary.

use std::future::Future;
use std::pin::Pin;

use council_types::{Address, PublicKey, TxHash};
use council_utils::Transient;
use thiserror::Error;

pub type ChainFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChainError>> + Send + 'a>>;

/// Failure reported by a chain collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// RPC unreachable, timed out, or returned garbage. Reads may retry.
    #[error("transport error: {0}")]
    Transport(String),
    /// The call executed and reverted.
    #[error("reverted: {0}")]
    Reverted(String),
    /// The wallet refused to send the transaction.
    #[error("transaction rejected by the wallet")]
    Rejected,
}

impl Transient for ChainError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Raw registry record for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryEntry {
    pub appointed_agent: Option<Address>,
    pub public_key: Option<PublicKey>,
}

/// Registry contract calls. Writes are sent from `caller`.
pub trait RegistryContract: Send + Sync {
    fn list_signers(&self) -> ChainFuture<'_, Vec<Address>>;
    fn is_signer(&self, address: Address) -> ChainFuture<'_, bool>;
    fn get_entry(&self, owner: Address) -> ChainFuture<'_, RegistryEntry>;
    /// Code-size inspection: `true` when `address` holds contract code.
    fn is_contract(&self, address: Address) -> ChainFuture<'_, bool>;
    /// One address per signer: its appointed agent, or the signer itself.
    fn encryption_agents(&self) -> ChainFuture<'_, Vec<Address>>;

    fn appoint_agent(&self, caller: Address, agent: Address) -> ChainFuture<'_, TxHash>;
    fn set_own_public_key(&self, caller: Address, key: PublicKey) -> ChainFuture<'_, TxHash>;
    fn set_public_key(
        &self,
        caller: Address,
        owner: Address,
        key: PublicKey,
    ) -> ChainFuture<'_, TxHash>;
}
