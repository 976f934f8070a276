//! In-memory registry contract for tests and local demos.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use council_types::{Address, PublicKey, TxHash};

use crate::contract::{ChainError, ChainFuture, RegistryContract, RegistryEntry};

#[derive(Debug, Default)]
struct State {
    signers: Vec<Address>,
    entries: HashMap<Address, RegistryEntry>,
    contracts: HashSet<Address>,
    revert_next_write: Option<String>,
    reject_next_write: bool,
}

/// Registry contract that keeps everything in a mutex.
///
/// Mirrors the on-chain rules: only signers appoint, an owner with an agent
/// cannot set its own key, and only the appointed agent may set the owner's
/// key. Re-appointing clears the key unless built with
/// [`keeping_keys_on_appoint`](Self::keeping_keys_on_appoint).
#[derive(Debug)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
    clears_key_on_appoint: bool,
    failing_reads: AtomicU32,
    read_calls: AtomicU32,
    write_attempts: AtomicU32,
    tx_counter: AtomicU64,
}

impl InMemoryRegistry {
    pub fn new(signers: impl IntoIterator<Item = Address>) -> Self {
        Self {
            state: Mutex::new(State {
                signers: signers.into_iter().collect(),
                ..State::default()
            }),
            clears_key_on_appoint: true,
            failing_reads: AtomicU32::new(0),
            read_calls: AtomicU32::new(0),
            write_attempts: AtomicU32::new(0),
            tx_counter: AtomicU64::new(0),
        }
    }

    /// Model a registry that leaves the old key in place on re-appointment.
    #[must_use]
    pub fn keeping_keys_on_appoint(mut self) -> Self {
        self.clears_key_on_appoint = false;
        self
    }

    pub fn add_signer(&self, signer: Address) {
        let mut state = self.lock();
        if !state.signers.contains(&signer) {
            state.signers.push(signer);
        }
    }

    pub fn remove_signer(&self, signer: Address) {
        let mut state = self.lock();
        state.signers.retain(|s| *s != signer);
        state.entries.remove(&signer);
    }

    /// Give `address` contract code.
    pub fn mark_contract(&self, address: Address) {
        self.lock().contracts.insert(address);
    }

    /// The next `count` reads fail with a transport error.
    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// The next write reverts with `reason`.
    pub fn revert_next_write(&self, reason: &str) {
        self.lock().revert_next_write = Some(reason.to_string());
    }

    /// The wallet refuses to send the next write.
    pub fn reject_next_write(&self) {
        self.lock().reject_next_write = true;
    }

    #[must_use]
    pub fn read_calls(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn write_attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Poisoning only happens if a test panicked while holding the lock.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn begin_read(&self) -> Result<(), ChainError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.failing_reads.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_reads.store(pending - 1, Ordering::SeqCst);
            return Err(ChainError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    fn write<F>(&self, apply: F) -> Result<TxHash, ChainError>
    where
        F: FnOnce(&mut State) -> Result<(), ChainError>,
    {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if std::mem::take(&mut state.reject_next_write) {
            return Err(ChainError::Rejected);
        }
        if let Some(reason) = state.revert_next_write.take() {
            return Err(ChainError::Reverted(reason));
        }
        apply(&mut state)?;
        Ok(self.next_tx())
    }

    fn next_tx(&self) -> TxHash {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        TxHash::new(bytes)
    }
}

fn reverted(reason: &str) -> ChainError {
    ChainError::Reverted(reason.to_string())
}

impl RegistryContract for InMemoryRegistry {
    fn list_signers(&self) -> ChainFuture<'_, Vec<Address>> {
        Box::pin(async move {
            self.begin_read()?;
            Ok(self.lock().signers.clone())
        })
    }

    fn is_signer(&self, address: Address) -> ChainFuture<'_, bool> {
        Box::pin(async move {
            self.begin_read()?;
            Ok(self.lock().signers.contains(&address))
        })
    }

    fn get_entry(&self, owner: Address) -> ChainFuture<'_, RegistryEntry> {
        Box::pin(async move {
            self.begin_read()?;
            Ok(self.lock().entries.get(&owner).cloned().unwrap_or_default())
        })
    }

    fn is_contract(&self, address: Address) -> ChainFuture<'_, bool> {
        Box::pin(async move {
            self.begin_read()?;
            Ok(self.lock().contracts.contains(&address))
        })
    }

    fn encryption_agents(&self) -> ChainFuture<'_, Vec<Address>> {
        Box::pin(async move {
            self.begin_read()?;
            let state = self.lock();
            Ok(state
                .signers
                .iter()
                .map(|signer| {
                    state
                        .entries
                        .get(signer)
                        .and_then(|e| e.appointed_agent)
                        .unwrap_or(*signer)
                })
                .collect())
        })
    }

    fn appoint_agent(&self, caller: Address, agent: Address) -> ChainFuture<'_, TxHash> {
        Box::pin(async move {
            self.write(|state| {
                if !state.signers.contains(&caller) {
                    return Err(reverted("NotASigner"));
                }
                let entry = state.entries.entry(caller).or_default();
                entry.appointed_agent = Some(agent);
                if self.clears_key_on_appoint {
                    entry.public_key = None;
                }
                Ok(())
            })
        })
    }

    fn set_own_public_key(&self, caller: Address, key: PublicKey) -> ChainFuture<'_, TxHash> {
        Box::pin(async move {
            self.write(|state| {
                if !state.signers.contains(&caller) {
                    return Err(reverted("NotASigner"));
                }
                let entry = state.entries.entry(caller).or_default();
                if entry.appointed_agent.is_some() {
                    return Err(reverted("MustResetAppointment"));
                }
                entry.public_key = Some(key);
                Ok(())
            })
        })
    }

    fn set_public_key(
        &self,
        caller: Address,
        owner: Address,
        key: PublicKey,
    ) -> ChainFuture<'_, TxHash> {
        Box::pin(async move {
            self.write(|state| {
                if !state.signers.contains(&owner) {
                    return Err(reverted("NotASigner"));
                }
                let entry = state.entries.entry(owner).or_default();
                if entry.appointed_agent != Some(caller) {
                    return Err(reverted("MustBeAppointed"));
                }
                entry.public_key = Some(key);
                Ok(())
            })
        })
    }
}
