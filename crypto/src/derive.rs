//! Encryption keys derived from a wallet signature.
//!
//! The wallet signs one fixed message; the signature is hashed into an X25519
//! scalar. Nothing is stored: the same wallet produces the same keypair every
//! time it signs, so the key can be recomputed whenever a session needs it.
//! That only holds for wallets with deterministic signatures (RFC 6979 style),
//! which is why registration goes through [`KeyDeriver::request_verified_signature`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use council_types::{Address, PublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Message every wallet signs to derive its encryption key. Changing it
/// changes every derived key, orphaning registered keys.
pub const KEY_DERIVATION_MESSAGE: &str = "Security council emergency proposals\n\n\
Sign this message to derive your proposal encryption key.\n\
This signature does not authorize any transaction.\n\n\
Version: 1";

const SEED_DOMAIN: &[u8] = b"council/x25519-seed/v1";

pub type SignFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, WalletError>> + Send + 'a>>;

/// The connected wallet.
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Address;
    /// Sign `message` as a personal message.
    fn sign<'a>(&'a self, message: &'a [u8]) -> SignFuture<'a>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("signature request rejected")]
    Rejected,
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, Error)]
pub enum KeyError {
    #[error("the wallet declined to sign the key derivation message")]
    UserRejected,
    #[error("signing failed: {0}")]
    SignatureError(String),
}

/// X25519 keypair held only for the lifetime of a wallet session.
///
/// The secret is zeroized on drop and never appears in `Debug` output.
#[derive(Clone)]
pub struct DerivedKeyPair {
    owner: Address,
    secret: StaticSecret,
    public_key: PublicKey,
}

impl DerivedKeyPair {
    /// Derive from raw signature bytes. `owner` is the wallet that signed.
    #[must_use]
    pub fn from_signature(owner: Address, signature: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(SEED_DOMAIN);
        hasher.update(signature);
        let mut seed: [u8; 32] = hasher.finalize().into();
        let secret = StaticSecret::from(seed);
        seed.zeroize();

        let public_key = PublicKey::new(X25519PublicKey::from(&secret).to_bytes());
        Self {
            owner,
            secret,
            public_key,
        }
    }

    #[must_use]
    pub fn owner(&self) -> Address {
        self.owner
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Raw private scalar, for callers that must compare derivations.
    #[must_use]
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl fmt::Debug for DerivedKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKeyPair")
            .field("owner", &self.owner)
            .field("public_key", &self.public_key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Requests derivation signatures from a wallet.
#[derive(Debug, Clone, Copy)]
pub struct KeyDeriver {
    verify_determinism: bool,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self {
            verify_determinism: true,
        }
    }
}

impl KeyDeriver {
    #[must_use]
    pub fn new(verify_determinism: bool) -> Self {
        Self { verify_determinism }
    }

    /// Ask the wallet for one signature and derive the keypair from it.
    pub async fn request_signature(
        &self,
        signer: &dyn WalletSigner,
    ) -> Result<DerivedKeyPair, KeyError> {
        let signature = sign_derivation_message(signer).await?;
        let keys = DerivedKeyPair::from_signature(signer.address(), &signature);
        tracing::debug!(owner = %keys.owner(), public_key = %keys.public_key(), "Derived encryption key");
        Ok(keys)
    }

    /// Sign twice and refuse to derive if the wallet randomizes its signatures.
    ///
    /// A randomized signer would yield a different key every session, making
    /// content encrypted to the registered key unreadable later.
    pub async fn request_verified_signature(
        &self,
        signer: &dyn WalletSigner,
    ) -> Result<DerivedKeyPair, KeyError> {
        let first = sign_derivation_message(signer).await?;
        let second = sign_derivation_message(signer).await?;
        if first != second {
            tracing::warn!(owner = %signer.address(), "Wallet produced non-deterministic signatures");
            return Err(KeyError::SignatureError(
                "wallet signatures are not deterministic; a derived key could not be recovered later"
                    .to_string(),
            ));
        }
        Ok(DerivedKeyPair::from_signature(signer.address(), &first))
    }

    /// Derivation used before binding a key on-chain, honoring the
    /// determinism-check setting.
    pub async fn derive_for_registration(
        &self,
        signer: &dyn WalletSigner,
    ) -> Result<DerivedKeyPair, KeyError> {
        if self.verify_determinism {
            self.request_verified_signature(signer).await
        } else {
            self.request_signature(signer).await
        }
    }
}

async fn sign_derivation_message(signer: &dyn WalletSigner) -> Result<Vec<u8>, KeyError> {
    match signer.sign(KEY_DERIVATION_MESSAGE.as_bytes()).await {
        Ok(signature) if signature.is_empty() => Err(KeyError::SignatureError(
            "wallet returned an empty signature".to_string(),
        )),
        Ok(signature) => Ok(signature),
        Err(WalletError::Rejected) => Err(KeyError::UserRejected),
        Err(WalletError::Failed(reason)) => Err(KeyError::SignatureError(reason)),
    }
}
