//! Shared test fixtures
//!
//! In-memory emergency proposal contract, fake wallets, and a council builder
//! wiring them to the registry and content-store test doubles.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use council_config::CouncilConfig;
use council_core::{
    Collaborators, Coordinator, ProposalContract, ProposalSubmission, StartReceipt, actions_hash,
};
use council_crypto::{SignFuture, WalletError, WalletSigner};
use council_registry::{ChainError, ChainFuture, InMemoryRegistry};
use council_store::InMemoryContentStore;
use council_types::{
    Address, EmergencyProposal, ProposalAction, ProposalId, ProposalMetadata, ProposalParameters,
    TxHash,
};

pub const MIN_APPROVALS: u16 = 2;

pub fn addr(byte: u8) -> Address {
    Address::new([byte; 20])
}

pub fn destination_plugin() -> Address {
    addr(0xdd)
}

// ── Wallet ───────────────────────────────────────────────────

/// Wallet whose signature is its address followed by the message.
pub struct Wallet {
    address: Address,
    randomized: bool,
    nonce: AtomicU32,
}

impl Wallet {
    pub fn new(byte: u8) -> Self {
        Self {
            address: addr(byte),
            randomized: false,
            nonce: AtomicU32::new(0),
        }
    }

    /// A wallet that mixes a counter into every signature.
    pub fn randomized(byte: u8) -> Self {
        Self {
            randomized: true,
            ..Self::new(byte)
        }
    }
}

impl WalletSigner for Wallet {
    fn address(&self) -> Address {
        self.address
    }

    fn sign<'a>(&'a self, message: &'a [u8]) -> SignFuture<'a> {
        Box::pin(async move {
            let mut signature = self.address.as_bytes().to_vec();
            signature.extend_from_slice(message);
            if self.randomized {
                let n = self.nonce.fetch_add(1, Ordering::SeqCst);
                signature.extend_from_slice(&n.to_be_bytes());
            }
            Ok::<_, WalletError>(signature)
        })
    }
}

// ── Proposal contract ────────────────────────────────────────

#[derive(Default)]
struct State {
    proposals: Vec<EmergencyProposal>,
    approvals: HashSet<(ProposalId, Address)>,
    reject_next_write: bool,
}

/// Emergency multisig kept in memory. Enforces the same rules the chain
/// would: one approval per address, no approvals after expiry, execution
/// only past the threshold and only with the committed actions.
pub struct InMemoryProposals {
    state: Mutex<State>,
    lifetime: Duration,
    execute_calls: AtomicU32,
    tx_counter: AtomicU64,
}

impl InMemoryProposals {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            lifetime: Duration::days(7),
            execute_calls: AtomicU32::new(0),
            tx_counter: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_tx(&self) -> TxHash {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [0xaa; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        TxHash::new(bytes)
    }

    /// Insert a proposal with arbitrary on-chain state.
    pub fn insert(&self, mut proposal: EmergencyProposal) -> ProposalId {
        let mut state = self.lock();
        let id = ProposalId::new(state.proposals.len() as u64);
        proposal.id = id;
        state.proposals.push(proposal);
        id
    }

    pub fn set_expiration(&self, id: ProposalId, expiration: DateTime<Utc>) {
        let mut state = self.lock();
        if let Some(p) = state.proposals.get_mut(id.value() as usize) {
            p.parameters.expiration_date = expiration;
        }
    }

    /// The next write fails as if the user refused to send it.
    pub fn reject_next_write(&self) {
        self.lock().reject_next_write = true;
    }

    /// Execute transactions that reached the contract, successful or not.
    pub fn execute_calls(&self) -> u32 {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, id: ProposalId) -> Option<EmergencyProposal> {
        self.lock().proposals.get(id.value() as usize).cloned()
    }

    fn take_rejection(state: &mut State) -> Result<(), ChainError> {
        if std::mem::take(&mut state.reject_next_write) {
            return Err(ChainError::Rejected);
        }
        Ok(())
    }
}

fn reverted(reason: &str) -> ChainError {
    ChainError::Reverted(reason.to_string())
}

impl ProposalContract for InMemoryProposals {
    fn proposal_count(&self) -> ChainFuture<'_, u64> {
        Box::pin(async move { Ok(self.lock().proposals.len() as u64) })
    }

    fn get_proposal(&self, id: ProposalId) -> ChainFuture<'_, Option<EmergencyProposal>> {
        Box::pin(async move { Ok(self.snapshot(id)) })
    }

    fn has_approved(&self, id: ProposalId, approver: Address) -> ChainFuture<'_, bool> {
        Box::pin(async move { Ok(self.lock().approvals.contains(&(id, approver))) })
    }

    fn start(
        &self,
        _caller: Address,
        submission: ProposalSubmission,
    ) -> ChainFuture<'_, StartReceipt> {
        Box::pin(async move {
            let mut state = self.lock();
            Self::take_rejection(&mut state)?;
            let id = ProposalId::new(state.proposals.len() as u64);
            let expiration_date = Utc::now() + self.lifetime;
            state.proposals.push(EmergencyProposal {
                id,
                executed: false,
                approvals: u16::from(submission.approve),
                parameters: ProposalParameters {
                    snapshot_block: 1_000 + id.value(),
                    expiration_date,
                    min_approvals: MIN_APPROVALS,
                },
                encrypted_payload_uri: submission.encrypted_payload_uri,
                public_metadata_hash: submission.public_metadata_hash,
                actions_hash: submission.actions_hash,
                destination_plugin: submission.destination_plugin,
            });
            Ok(StartReceipt {
                id,
                tx: self.next_tx(),
                expiration_date,
            })
        })
    }

    fn approve(&self, caller: Address, id: ProposalId) -> ChainFuture<'_, TxHash> {
        Box::pin(async move {
            let mut state = self.lock();
            Self::take_rejection(&mut state)?;
            if state.approvals.contains(&(id, caller)) {
                return Err(reverted("AlreadyApproved"));
            }
            let proposal = state
                .proposals
                .get_mut(id.value() as usize)
                .ok_or_else(|| reverted("NonexistentProposal"))?;
            if proposal.executed || proposal.is_expired(Utc::now()) {
                return Err(reverted("ApprovalCastForbidden"));
            }
            proposal.approvals += 1;
            state.approvals.insert((id, caller));
            Ok(self.next_tx())
        })
    }

    fn execute(
        &self,
        _caller: Address,
        id: ProposalId,
        actions: Vec<ProposalAction>,
    ) -> ChainFuture<'_, TxHash> {
        Box::pin(async move {
            self.execute_calls.fetch_add(1, Ordering::SeqCst);
            let mut state = self.lock();
            Self::take_rejection(&mut state)?;
            let proposal = state
                .proposals
                .get_mut(id.value() as usize)
                .ok_or_else(|| reverted("NonexistentProposal"))?;
            if proposal.executed
                || proposal.is_expired(Utc::now())
                || !proposal.threshold_reached()
            {
                return Err(reverted("ProposalExecutionForbidden"));
            }
            let hash = actions_hash(&actions).map_err(|e| reverted(&e.to_string()))?;
            if hash != proposal.actions_hash {
                return Err(reverted("InvalidActions"));
            }
            proposal.executed = true;
            Ok(self.next_tx())
        })
    }
}

// ── Council fixture ──────────────────────────────────────────

pub struct Council {
    pub coordinator: Coordinator,
    pub registry: Arc<InMemoryRegistry>,
    pub proposals: Arc<InMemoryProposals>,
    pub store: Arc<InMemoryContentStore>,
}

const TEST_CONFIG: &str = r"
[retry]
max_retries = 2
initial_delay_ms = 1
max_delay_ms = 5
jitter_factor = 0.0
";

impl Council {
    pub fn new(signers: &[u8]) -> Self {
        let registry = Arc::new(InMemoryRegistry::new(signers.iter().map(|b| addr(*b))));
        let proposals = Arc::new(InMemoryProposals::new());
        let store = Arc::new(InMemoryContentStore::new());
        let config = CouncilConfig::parse(TEST_CONFIG).unwrap();
        let coordinator = Coordinator::new(
            Collaborators {
                registry: registry.clone(),
                proposals: proposals.clone(),
                store: store.clone(),
            },
            &config,
            destination_plugin(),
        );
        Self {
            coordinator,
            registry,
            proposals,
            store,
        }
    }
}

pub fn metadata(title: &str) -> ProposalMetadata {
    ProposalMetadata {
        title: title.try_into().unwrap(),
        summary: "Emergency response".to_string(),
        description: String::new(),
        resources: Vec::new(),
    }
}

pub fn transfer(to: u8, value: u128) -> ProposalAction {
    ProposalAction {
        to: addr(to),
        value,
        data: Vec::new(),
    }
}
