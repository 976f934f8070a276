//! Recompute and broadcast the connected account's capability.
//!
//! Subscribers hold a [`watch::Receiver`]; the monitor publishes a new
//! [`CapabilityStatus`] after every invalidation event it is fed.

use std::sync::Arc;

use council_registry::{InvalidationEvent, RegistryClient};
use council_types::Address;
use tokio::sync::{RwLock, watch};

use crate::capability::{CapabilityStatus, capability_of};
use crate::session::SessionContext;

#[derive(Debug)]
pub struct CapabilityMonitor {
    registry: Arc<RegistryClient>,
    session: SessionContext,
    account: RwLock<Option<Address>>,
    status: watch::Sender<CapabilityStatus>,
}

impl CapabilityMonitor {
    pub fn new(registry: Arc<RegistryClient>, session: SessionContext) -> Self {
        let (status, _) = watch::channel(CapabilityStatus::Loading);
        Self {
            registry,
            session,
            account: RwLock::new(None),
            status,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CapabilityStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> CapabilityStatus {
        *self.status.borrow()
    }

    pub async fn account(&self) -> Option<Address> {
        *self.account.read().await
    }

    /// Start tracking `address`.
    pub async fn connect(&self, address: Address) -> CapabilityStatus {
        *self.account.write().await = Some(address);
        self.status.send_replace(CapabilityStatus::Loading);
        self.refresh().await
    }

    /// Apply `event` to the registry cache and session, then recompute.
    pub async fn handle(&self, event: InvalidationEvent) -> CapabilityStatus {
        self.registry.invalidate(event).await;
        self.session.handle(event).await;
        match event {
            InvalidationEvent::AccountSwitched(address) => {
                *self.account.write().await = Some(address);
                self.status.send_replace(CapabilityStatus::Loading);
            }
            InvalidationEvent::Disconnected => {
                *self.account.write().await = None;
            }
            InvalidationEvent::MembershipChanged | InvalidationEvent::RegistryEntryChanged(_) => {}
        }
        self.refresh().await
    }

    /// Recompute for the tracked account and publish the result.
    pub async fn refresh(&self) -> CapabilityStatus {
        let status = match self.account().await {
            Some(address) => capability_of(&self.registry, address).await,
            None => CapabilityStatus::Loading,
        };
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!(%previous, %status, "Capability changed");
        }
        status
    }
}
