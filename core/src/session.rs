//! The derived keypair of the connected wallet.
//!
//! A [`SessionContext`] is cheap to clone and every clone sees the same key.
//! The key is derived on first use, never persisted, and dropped when the
//! wallet switches account or disconnects.

use std::sync::Arc;

use council_crypto::{DerivedKeyPair, KeyDeriver, WalletSigner};
use council_registry::InvalidationEvent;
use council_types::Address;
use tokio::sync::Mutex;

use crate::error::CouncilError;

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    keys: Arc<Mutex<Option<DerivedKeyPair>>>,
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The session key, if one was derived.
    pub async fn keys(&self) -> Option<DerivedKeyPair> {
        self.keys.lock().await.clone()
    }

    /// Owner of the session key.
    pub async fn owner(&self) -> Option<Address> {
        self.keys.lock().await.as_ref().map(DerivedKeyPair::owner)
    }

    /// The session key for `signer`, deriving it if needed.
    ///
    /// The lock is held while the wallet signs, so concurrent callers share
    /// one signature prompt.
    pub async fn ensure_keys(
        &self,
        deriver: &KeyDeriver,
        signer: &dyn WalletSigner,
    ) -> Result<DerivedKeyPair, CouncilError> {
        let mut slot = self.keys.lock().await;
        if let Some(keys) = slot.as_ref()
            && keys.owner() == signer.address()
        {
            return Ok(keys.clone());
        }
        let keys = deriver.request_signature(signer).await?;
        tracing::debug!(owner = %keys.owner(), "Session key derived");
        *slot = Some(keys.clone());
        Ok(keys)
    }

    /// Adopt a key derived elsewhere (e.g. during registration).
    pub async fn install(&self, keys: DerivedKeyPair) {
        *self.keys.lock().await = Some(keys);
    }

    pub async fn clear(&self) {
        if self.keys.lock().await.take().is_some() {
            tracing::debug!("Session key cleared");
        }
    }

    /// Drop the key when `event` ends the wallet session.
    pub async fn handle(&self, event: InvalidationEvent) {
        if event.ends_session() {
            self.clear().await;
        }
    }
}
