//! Cryptography for confidential council proposals.
//!
//! - **`derive`**: X25519 keypairs recomputed from a wallet signature, never stored
//! - **`codec`**: multi-recipient hybrid encryption of proposal payloads
//! - **`hash`**: Keccak-256 commitments checked against on-chain hashes

pub mod codec;
pub mod derive;
pub mod hash;

pub use codec::{CodecError, EncryptedPayload, WrappedKey, decrypt, encrypt};
pub use derive::{
    DerivedKeyPair, KEY_DERIVATION_MESSAGE, KeyDeriver, KeyError, SignFuture, WalletError,
    WalletSigner,
};
pub use hash::keccak256;
