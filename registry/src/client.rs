//! Read-through client for the signer registry.
//!
//! Reads are cached with the staleness bound from the shared [`RetryPolicy`]
//! and retried with backoff on transport errors. Writes go straight to the
//! contract, are never retried, and invalidate what they touched.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use council_types::{Address, KeyTarget, PublicKey, SignerAccount, TxHash};
use council_utils::{Fresh, RetryPolicy, retry_with_backoff};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::contract::{ChainError, ChainFuture, RegistryContract};
use crate::events::InvalidationEvent;

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("registry read `{operation}` failed after {attempts} attempt(s): {reason}")]
    Read {
        operation: &'static str,
        attempts: u32,
        reason: String,
    },
    #[error("registry write rejected: {reason}")]
    Write { reason: String },
    /// The wallet refused to send the transaction.
    #[error("registry write cancelled in the wallet")]
    Rejected,
}

impl RegistryError {
    fn write(reason: impl Into<String>) -> Self {
        Self::Write {
            reason: reason.into(),
        }
    }
}

impl From<ChainError> for RegistryError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Rejected => Self::Rejected,
            other => Self::write(other.to_string()),
        }
    }
}

pub struct RegistryClient {
    contract: Arc<dyn RegistryContract>,
    policy: RetryPolicy,
    signers: RwLock<Option<Fresh<BTreeSet<Address>>>>,
    accounts: RwLock<HashMap<Address, Fresh<SignerAccount>>>,
    /// Keys that survived a re-appointment on-chain. Hidden until the owner
    /// registers again.
    superseded_keys: RwLock<HashMap<Address, PublicKey>>,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RegistryClient {
    pub fn new(contract: Arc<dyn RegistryContract>, policy: RetryPolicy) -> Self {
        Self {
            contract,
            policy,
            signers: RwLock::new(None),
            accounts: RwLock::new(HashMap::new()),
            superseded_keys: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Current council membership.
    pub async fn list_signers(&self) -> Result<BTreeSet<Address>, RegistryError> {
        let bound = self.policy.staleness_bound;
        if let Some(cached) = self.signers.read().await.as_ref()
            && let Some(signers) = cached.get_within(bound)
        {
            return Ok(signers.clone());
        }
        self.refresh_signers().await
    }

    /// Refetch membership regardless of cache age.
    pub async fn refresh_signers(&self) -> Result<BTreeSet<Address>, RegistryError> {
        let signers: BTreeSet<Address> = self
            .read("list_signers", || self.contract.list_signers())
            .await?
            .into_iter()
            .collect();
        *self.signers.write().await = Some(Fresh::new(signers.clone()));
        tracing::debug!(count = signers.len(), "Refreshed signer list");
        Ok(signers)
    }

    /// Membership of a single address. Answered from the cached signer list
    /// while it is fresh, otherwise asked of the contract directly.
    pub async fn is_listed_signer(&self, address: Address) -> Result<bool, RegistryError> {
        let bound = self.policy.staleness_bound;
        if let Some(cached) = self.signers.read().await.as_ref()
            && let Some(signers) = cached.get_within(bound)
        {
            return Ok(signers.contains(&address));
        }
        self.read("is_signer", || self.contract.is_signer(address))
            .await
    }

    /// Appointment and key state for `owner`.
    pub async fn get_account(&self, owner: Address) -> Result<SignerAccount, RegistryError> {
        let bound = self.policy.staleness_bound;
        if let Some(cached) = self.accounts.read().await.get(&owner)
            && let Some(account) = cached.get_within(bound)
        {
            return Ok(account.clone());
        }
        self.refresh_account(owner).await
    }

    /// Refetch `owner` regardless of cache age.
    pub async fn refresh_account(&self, owner: Address) -> Result<SignerAccount, RegistryError> {
        let entry = self
            .read("get_entry", || self.contract.get_entry(owner))
            .await?;
        let is_contract = self.is_contract(owner).await?;

        let mut registered_public_key = entry.public_key;
        if let Some(superseded) = self.superseded_keys.read().await.get(&owner)
            && registered_public_key == Some(*superseded)
        {
            registered_public_key = None;
        }

        let account = SignerAccount {
            owner,
            appointed_agent: entry.appointed_agent,
            registered_public_key,
            is_contract,
        };
        self.accounts
            .write()
            .await
            .insert(owner, Fresh::new(account.clone()));
        Ok(account)
    }

    pub async fn is_contract(&self, address: Address) -> Result<bool, RegistryError> {
        self.read("is_contract", || self.contract.is_contract(address))
            .await
    }

    /// The listed signer that appointed `agent`, if any.
    pub async fn find_appointer(&self, agent: Address) -> Result<Option<Address>, RegistryError> {
        for signer in self.list_signers().await? {
            if self.get_account(signer).await?.appointed_agent == Some(agent) {
                return Ok(Some(signer));
            }
        }
        Ok(None)
    }

    /// Registered keys of every encryption agent. Agents without a key are
    /// skipped and logged; they will not be able to read the payload.
    pub async fn encryption_recipients(&self) -> Result<Vec<PublicKey>, RegistryError> {
        let agents = self
            .read("encryption_agents", || self.contract.encryption_agents())
            .await?;

        let mut by_identity = HashMap::new();
        for signer in self.list_signers().await? {
            let account = self.get_account(signer).await?;
            by_identity.insert(account.decryption_identity(), account);
        }

        let mut keys = Vec::with_capacity(agents.len());
        for agent in agents {
            match by_identity.get(&agent).and_then(|a| a.registered_public_key) {
                Some(key) if !keys.contains(&key) => keys.push(key),
                Some(_) => {}
                None => tracing::warn!(%agent, "Encryption agent has no registered public key"),
            }
        }
        Ok(keys)
    }

    /// Appoint `agent` to decrypt on behalf of `caller`.
    ///
    /// Any key registered for `caller` stops counting: the new agent must
    /// register its own.
    pub async fn appoint_agent(
        &self,
        caller: Address,
        agent: Address,
    ) -> Result<TxHash, RegistryError> {
        if !self.is_listed_signer(caller).await? {
            return Err(RegistryError::write(format!(
                "{caller} is not a listed signer"
            )));
        }
        if self.is_contract(agent).await? {
            return Err(RegistryError::write(format!(
                "{agent} is a contract and cannot hold an encryption key"
            )));
        }

        let previous_key = self.get_account(caller).await?.registered_public_key;
        let tx = self.contract.appoint_agent(caller, agent).await?;
        tracing::info!(owner = %caller, %agent, %tx, "Appointed agent");

        if let Some(previous) = previous_key {
            self.superseded_keys.write().await.insert(caller, previous);
        }
        self.invalidate(InvalidationEvent::RegistryEntryChanged(caller))
            .await;
        let entry = self
            .read("get_entry", || self.contract.get_entry(caller))
            .await?;
        if previous_key.is_some() && entry.public_key == previous_key {
            tracing::warn!(
                owner = %caller,
                "Registry kept the previous public key after re-appointment; ignoring it until a new key is registered"
            );
        }
        self.refresh_account(caller).await?;
        Ok(tx)
    }

    /// Bind `key` to the caller (`Own`) or to the signer that appointed the
    /// caller (`Appointed`).
    pub async fn register_public_key(
        &self,
        caller: Address,
        target: KeyTarget,
        key: PublicKey,
    ) -> Result<TxHash, RegistryError> {
        if self.is_contract(caller).await? {
            return Err(RegistryError::write(format!(
                "{caller} is a contract and cannot derive an encryption key"
            )));
        }

        let (owner, tx) = match target {
            KeyTarget::Own => {
                let account = self.get_account(caller).await?;
                if !self.is_listed_signer(caller).await? {
                    return Err(RegistryError::write(format!(
                        "{caller} is not a listed signer"
                    )));
                }
                if let Some(agent) = account.appointed_agent {
                    return Err(RegistryError::write(format!(
                        "{caller} has appointed {agent}; the agent must register the key"
                    )));
                }
                (caller, self.contract.set_own_public_key(caller, key).await?)
            }
            KeyTarget::Appointed => {
                let Some(owner) = self.find_appointer(caller).await? else {
                    return Err(RegistryError::write(format!(
                        "{caller} is not appointed by any listed signer"
                    )));
                };
                (owner, self.contract.set_public_key(caller, owner, key).await?)
            }
        };
        tracing::info!(%owner, registrant = %caller, %tx, "Registered public key");

        self.superseded_keys.write().await.remove(&owner);
        self.invalidate(InvalidationEvent::RegistryEntryChanged(owner))
            .await;
        Ok(tx)
    }

    /// Drop cached state made untrustworthy by `event`.
    pub async fn invalidate(&self, event: InvalidationEvent) {
        match event {
            InvalidationEvent::MembershipChanged => {
                *self.signers.write().await = None;
            }
            InvalidationEvent::RegistryEntryChanged(owner) => {
                self.accounts.write().await.remove(&owner);
            }
            // Registry state is chain state; it does not depend on who is connected.
            InvalidationEvent::AccountSwitched(_) | InvalidationEvent::Disconnected => {}
        }
    }

    async fn read<'a, T, F>(
        &'a self,
        operation: &'static str,
        call: F,
    ) -> Result<T, RegistryError>
    where
        F: FnMut() -> ChainFuture<'a, T>,
    {
        retry_with_backoff(operation, &self.policy, call)
            .await
            .into_result(|err, attempts| RegistryError::Read {
                operation,
                attempts,
                reason: err.to_string(),
            })
    }
}
