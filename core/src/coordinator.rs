//! Emergency proposal lifecycle.
//!
//! ```text
//! Draft ──start──▶ Submitted ──approvals ≥ threshold──▶ Approved ──execute──▶ Executed
//!                      │                                   │
//!                      └──────── now > expiration ─────────┴──▶ Expired
//! ```
//!
//! Every operation re-checks the caller's capability against registry state
//! no older than the staleness bound. Nothing is recorded locally until the
//! contract confirms, so a rejected signature or transaction leaves no trace.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use council_config::CouncilConfig;
use council_crypto::{EncryptedPayload, KeyDeriver, WalletSigner, decrypt, encrypt};
use council_registry::{RegistryClient, RegistryContract};
use council_store::{ContentStore, fetch_with_retry};
use council_types::{
    Address, Approval, EmergencyProposal, Hash32, KeyTarget, ProposalAction, ProposalId,
    ProposalMetadata, ProposalStatus, PublicKey, TxHash,
};
use council_utils::{RetryPolicy, retry_with_backoff};

use crate::capability::{CapabilityStatus, Operation, capability_of};
use crate::commitment::{ProposalContent, actions_hash, metadata_hash};
use crate::contract::{ProposalContract, ProposalSubmission};
use crate::error::{Commitment, CouncilError};
use crate::monitor::CapabilityMonitor;
use crate::session::SessionContext;

/// Who a new proposal is encrypted for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Recipients {
    /// Registered keys of every current encryption agent.
    #[default]
    EncryptionAgents,
    Explicit(Vec<PublicKey>),
}

/// A confirmed proposal creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedProposal {
    pub id: ProposalId,
    pub tx: TxHash,
    pub payload_uri: String,
    pub recipient_count: usize,
    pub expires_at: DateTime<Utc>,
}

/// A proposal whose payload was decrypted and matched its commitments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedProposal {
    pub proposal: EmergencyProposal,
    pub metadata: ProposalMetadata,
    pub actions: Vec<ProposalAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalSummary {
    pub proposal: EmergencyProposal,
    pub status: ProposalStatus,
}

/// Remote collaborators the coordinator drives.
pub struct Collaborators {
    pub registry: Arc<dyn RegistryContract>,
    pub proposals: Arc<dyn ProposalContract>,
    pub store: Arc<dyn ContentStore>,
}

pub struct Coordinator {
    registry: Arc<RegistryClient>,
    proposals: Arc<dyn ProposalContract>,
    store: Arc<dyn ContentStore>,
    session: SessionContext,
    deriver: KeyDeriver,
    policy: RetryPolicy,
    destination_plugin: Address,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("registry", &self.registry)
            .field("session", &self.session)
            .field("destination_plugin", &self.destination_plugin)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(
        collaborators: Collaborators,
        config: &CouncilConfig,
        destination_plugin: Address,
    ) -> Self {
        let policy = config.retry_policy();
        Self {
            registry: Arc::new(RegistryClient::new(collaborators.registry, policy.clone())),
            proposals: collaborators.proposals,
            store: collaborators.store,
            session: SessionContext::new(),
            deriver: KeyDeriver::new(config.verify_key_determinism()),
            policy,
            destination_plugin,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RegistryClient> {
        &self.registry
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// A monitor sharing this coordinator's registry cache and session.
    #[must_use]
    pub fn monitor(&self) -> CapabilityMonitor {
        CapabilityMonitor::new(Arc::clone(&self.registry), self.session.clone())
    }

    pub async fn capability(&self, address: Address) -> CapabilityStatus {
        capability_of(&self.registry, address).await
    }

    async fn require(
        &self,
        address: Address,
        operation: Operation,
    ) -> Result<CapabilityStatus, CouncilError> {
        let status = self.capability(address).await;
        if operation.allowed_by(status) {
            Ok(status)
        } else {
            tracing::info!(%address, %status, %operation, "Capability denied");
            Err(CouncilError::CapabilityDenied { operation, status })
        }
    }

    // ── Key management ───────────────────────────────────────

    /// Appoint `agent` to decrypt for the connected signer.
    pub async fn appoint_agent(
        &self,
        signer: &dyn WalletSigner,
        agent: Address,
    ) -> Result<TxHash, CouncilError> {
        Ok(self.registry.appoint_agent(signer.address(), agent).await?)
    }

    /// Derive the connected wallet's key and register it for `target`.
    ///
    /// The derived key becomes the session key once the registration is
    /// confirmed.
    pub async fn register_public_key(
        &self,
        signer: &dyn WalletSigner,
        target: KeyTarget,
    ) -> Result<TxHash, CouncilError> {
        let keys = self.deriver.derive_for_registration(signer).await?;
        let tx = self
            .registry
            .register_public_key(signer.address(), target, keys.public_key())
            .await?;
        self.session.install(keys).await;
        Ok(tx)
    }

    // ── Reads ────────────────────────────────────────────────

    pub async fn proposal(&self, id: ProposalId) -> Result<EmergencyProposal, CouncilError> {
        retry_with_backoff("get_proposal", &self.policy, || {
            self.proposals.get_proposal(id)
        })
        .await
        .into_result(|err, _| CouncilError::contract("get_proposal", err))?
        .ok_or(CouncilError::ProposalNotFound(id))
    }

    /// Every proposal with its status as of now, oldest first.
    pub async fn list_proposals(&self) -> Result<Vec<ProposalSummary>, CouncilError> {
        let count = retry_with_backoff("proposal_count", &self.policy, || {
            self.proposals.proposal_count()
        })
        .await
        .into_result(|err, _| CouncilError::contract("proposal_count", err))?;

        let now = Utc::now();
        let mut summaries = Vec::new();
        for raw in 0..count {
            match self.proposal(ProposalId::new(raw)).await {
                Ok(proposal) => summaries.push(ProposalSummary {
                    status: proposal.status(now),
                    proposal,
                }),
                Err(CouncilError::ProposalNotFound(id)) => {
                    tracing::warn!(%id, count, "Proposal within count is missing");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(summaries)
    }

    /// Decrypt a proposal and check it against its commitments.
    pub async fn read_proposal(
        &self,
        signer: &dyn WalletSigner,
        id: ProposalId,
    ) -> Result<DecryptedProposal, CouncilError> {
        self.require(signer.address(), Operation::Decrypt).await?;
        let proposal = self.proposal(id).await?;
        self.open(signer, proposal).await
    }

    // ── Writes ───────────────────────────────────────────────

    pub async fn create_proposal(
        &self,
        signer: &dyn WalletSigner,
        actions: Vec<ProposalAction>,
        metadata: ProposalMetadata,
        recipients: Recipients,
    ) -> Result<CreatedProposal, CouncilError> {
        let caller = signer.address();
        self.require(caller, Operation::Create).await?;

        let keys = match recipients {
            Recipients::EncryptionAgents => self.registry.encryption_recipients().await?,
            Recipients::Explicit(keys) => keys,
        };

        let public_metadata_hash = metadata_hash(&metadata)?;
        let actions_hash = actions_hash(&actions)?;
        let content = ProposalContent { metadata, actions };
        let payload = encrypt(&content.to_bytes()?, &keys)?;
        let payload_uri = self.store.put(&payload.to_bytes()?).await?;

        let submission = ProposalSubmission {
            encrypted_payload_uri: payload_uri.clone(),
            public_metadata_hash,
            actions_hash,
            destination_plugin: self.destination_plugin,
            approve: false,
        };
        let receipt = self
            .proposals
            .start(caller, submission)
            .await
            .map_err(|err| CouncilError::contract("start", err))?;

        tracing::info!(
            id = %receipt.id,
            %caller,
            recipients = keys.len(),
            uri = %payload_uri,
            expires_at = %receipt.expiration_date,
            "Emergency proposal created"
        );
        Ok(CreatedProposal {
            id: receipt.id,
            tx: receipt.tx,
            payload_uri,
            recipient_count: keys.len(),
            expires_at: receipt.expiration_date,
        })
    }

    pub async fn approve(
        &self,
        signer: &dyn WalletSigner,
        id: ProposalId,
    ) -> Result<Approval, CouncilError> {
        let approver = signer.address();
        self.require(approver, Operation::Approve).await?;

        let proposal = self.proposal(id).await?;
        ensure_open(&proposal)?;

        let already = retry_with_backoff("has_approved", &self.policy, || {
            self.proposals.has_approved(id, approver)
        })
        .await
        .into_result(|err, _| CouncilError::contract("has_approved", err))?;
        if already {
            return Err(CouncilError::AlreadyApproved { id, approver });
        }

        let tx = self
            .proposals
            .approve(approver, id)
            .await
            .map_err(|err| CouncilError::contract("approve", err))?;
        tracing::info!(%id, %approver, %tx, "Proposal approved");
        Ok(Approval {
            proposal: id,
            approver,
            tx,
        })
    }

    /// Execute a proposal that reached its threshold.
    ///
    /// The payload is decrypted and checked against both commitments first;
    /// on any mismatch nothing is sent to the contract.
    pub async fn execute(
        &self,
        signer: &dyn WalletSigner,
        id: ProposalId,
    ) -> Result<TxHash, CouncilError> {
        let caller = signer.address();
        self.require(caller, Operation::Decrypt).await?;

        let proposal = self.proposal(id).await?;
        ensure_open(&proposal)?;
        if !proposal.threshold_reached() {
            return Err(CouncilError::ThresholdNotReached {
                id,
                approvals: proposal.approvals,
                required: proposal.required_approvals(),
            });
        }

        let opened = self.open(signer, proposal).await?;
        let tx = self
            .proposals
            .execute(caller, id, opened.actions)
            .await
            .map_err(|err| CouncilError::contract("execute", err))?;
        tracing::info!(%id, %caller, %tx, "Proposal executed");
        Ok(tx)
    }

    async fn open(
        &self,
        signer: &dyn WalletSigner,
        proposal: EmergencyProposal,
    ) -> Result<DecryptedProposal, CouncilError> {
        let keys = self.session.ensure_keys(&self.deriver, signer).await?;
        let bytes =
            fetch_with_retry(self.store.as_ref(), &proposal.encrypted_payload_uri, &self.policy)
                .await?;
        let payload = EncryptedPayload::from_bytes(&bytes)?;
        let plaintext = decrypt(&payload, &keys)?;
        let content = ProposalContent::from_bytes(&plaintext)?;

        check_commitment(
            proposal.id,
            Commitment::Actions,
            proposal.actions_hash,
            actions_hash(&content.actions)?,
        )?;
        check_commitment(
            proposal.id,
            Commitment::PublicMetadata,
            proposal.public_metadata_hash,
            metadata_hash(&content.metadata)?,
        )?;

        Ok(DecryptedProposal {
            proposal,
            metadata: content.metadata,
            actions: content.actions,
        })
    }
}

fn ensure_open(proposal: &EmergencyProposal) -> Result<(), CouncilError> {
    if proposal.executed {
        return Err(CouncilError::AlreadyExecuted(proposal.id));
    }
    if proposal.is_expired(Utc::now()) {
        return Err(CouncilError::ProposalExpired {
            id: proposal.id,
            expired_at: proposal.expiration_date(),
        });
    }
    Ok(())
}

fn check_commitment(
    id: ProposalId,
    commitment: Commitment,
    expected: Hash32,
    actual: Hash32,
) -> Result<(), CouncilError> {
    if expected == actual {
        return Ok(());
    }
    tracing::error!(
        %id,
        %commitment,
        %expected,
        %actual,
        "Decrypted proposal does not match its commitment"
    );
    Err(CouncilError::IntegrityViolation {
        commitment,
        expected,
        actual,
    })
}
