//! Hybrid encryption for confidential proposal payloads.
//!
//! The plaintext is sealed once with a random content key (ChaCha20-Poly1305).
//! The content key is then wrapped separately for every recipient through an
//! ephemeral X25519 exchange. Recipient identities are not recorded: a reader
//! tries each wrapped key with its own secret until one opens.
//!
//! The Keccak-256 hash of the plaintext travels with the payload and is bound
//! as associated data, so a payload whose hash was swapped will not open.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use council_types::{Hash32, PublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::derive::DerivedKeyPair;
use crate::hash::keccak256;

pub const PAYLOAD_VERSION: u8 = 1;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Content key length (32 bytes)
pub const CONTENT_KEY_LEN: usize = 32;

const WRAP_DOMAIN: &[u8] = b"council/key-wrap/v1";

#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("cannot encrypt for an empty recipient list")]
    NoRecipients,
    #[error("recipient key {0} is not a usable X25519 key")]
    InvalidRecipientKey(PublicKey),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("payload was not encrypted for this key")]
    NotARecipient,
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("decrypted content does not match its recorded hash")]
    ContentHashMismatch,
}

impl CodecError {
    /// Failures on the read side. Anything else happened while encrypting.
    #[must_use]
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            Self::NotARecipient | Self::Malformed(_) | Self::ContentHashMismatch
        )
    }
}

/// Content key sealed for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub ephemeral_public_key: PublicKey,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub wrapped_key: Vec<u8>,
}

/// Ciphertext plus everything a recipient needs to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub version: u8,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    pub recipients: Vec<WrappedKey>,
    pub content_hash: Hash32,
}

impl EncryptedPayload {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encryption(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }
}

/// Encrypt `plaintext` so that any one of `recipients` can decrypt it.
pub fn encrypt(plaintext: &[u8], recipients: &[PublicKey]) -> Result<EncryptedPayload, CodecError> {
    if recipients.is_empty() {
        return Err(CodecError::NoRecipients);
    }

    let content_hash = keccak256(plaintext);
    let content_key = Zeroizing::new(rand::random::<[u8; CONTENT_KEY_LEN]>());
    let nonce = rand::random::<[u8; NONCE_LEN]>();

    let cipher = ChaCha20Poly1305::new(Key::from_slice(content_key.as_slice()));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: content_hash.as_bytes(),
            },
        )
        .map_err(|e| CodecError::Encryption(e.to_string()))?;

    let wrapped = recipients
        .iter()
        .map(|recipient| wrap_content_key(&content_key, recipient))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        recipients = wrapped.len(),
        bytes = plaintext.len(),
        "Encrypted confidential payload"
    );

    Ok(EncryptedPayload {
        version: PAYLOAD_VERSION,
        nonce: nonce.to_vec(),
        ciphertext,
        recipients: wrapped,
        content_hash,
    })
}

/// Decrypt with a session keypair. Fails with [`CodecError::NotARecipient`]
/// when no wrapped key opens for `keys`.
pub fn decrypt(payload: &EncryptedPayload, keys: &DerivedKeyPair) -> Result<Vec<u8>, CodecError> {
    if payload.version != PAYLOAD_VERSION {
        return Err(CodecError::Malformed(format!(
            "unsupported payload version {}",
            payload.version
        )));
    }
    if payload.nonce.len() != NONCE_LEN {
        return Err(CodecError::Malformed(format!(
            "invalid nonce length: expected {NONCE_LEN}, got {}",
            payload.nonce.len()
        )));
    }

    let content_key = payload
        .recipients
        .iter()
        .find_map(|wrapped| unwrap_content_key(wrapped, keys))
        .ok_or(CodecError::NotARecipient)?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(content_key.as_slice()));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&payload.nonce),
            Payload {
                msg: &payload.ciphertext,
                aad: payload.content_hash.as_bytes(),
            },
        )
        .map_err(|_| CodecError::Malformed("ciphertext failed authentication".to_string()))?;

    if keccak256(&plaintext) != payload.content_hash {
        return Err(CodecError::ContentHashMismatch);
    }
    Ok(plaintext)
}

fn key_encryption_key(
    shared_secret: &[u8; 32],
    ephemeral_public: &PublicKey,
    recipient: &PublicKey,
) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(WRAP_DOMAIN);
    hasher.update(shared_secret);
    hasher.update(ephemeral_public.as_bytes());
    hasher.update(recipient.as_bytes());
    Zeroizing::new(hasher.finalize().into())
}

fn wrap_content_key(
    content_key: &[u8; CONTENT_KEY_LEN],
    recipient: &PublicKey,
) -> Result<WrappedKey, CodecError> {
    let ephemeral = StaticSecret::from(rand::random::<[u8; 32]>());
    let ephemeral_public = PublicKey::new(X25519PublicKey::from(&ephemeral).to_bytes());
    let shared = ephemeral.diffie_hellman(&X25519PublicKey::from(*recipient.as_bytes()));
    if !shared.was_contributory() {
        return Err(CodecError::InvalidRecipientKey(*recipient));
    }

    let kek = key_encryption_key(shared.as_bytes(), &ephemeral_public, recipient);
    let nonce = rand::random::<[u8; NONCE_LEN]>();
    let wrapped_key = ChaCha20Poly1305::new(Key::from_slice(kek.as_slice()))
        .encrypt(Nonce::from_slice(&nonce), content_key.as_slice())
        .map_err(|e| CodecError::Encryption(e.to_string()))?;

    Ok(WrappedKey {
        ephemeral_public_key: ephemeral_public,
        nonce: nonce.to_vec(),
        wrapped_key,
    })
}

fn unwrap_content_key(
    wrapped: &WrappedKey,
    keys: &DerivedKeyPair,
) -> Option<Zeroizing<[u8; CONTENT_KEY_LEN]>> {
    if wrapped.nonce.len() != NONCE_LEN {
        return None;
    }
    let shared = keys
        .secret()
        .diffie_hellman(&X25519PublicKey::from(*wrapped.ephemeral_public_key.as_bytes()));
    let kek = key_encryption_key(
        shared.as_bytes(),
        &wrapped.ephemeral_public_key,
        &keys.public_key(),
    );
    let opened = Zeroizing::new(
        ChaCha20Poly1305::new(Key::from_slice(kek.as_slice()))
            .decrypt(Nonce::from_slice(&wrapped.nonce), wrapped.wrapped_key.as_slice())
            .ok()?,
    );
    let key = <[u8; CONTENT_KEY_LEN]>::try_from(opened.as_slice()).ok()?;
    Some(Zeroizing::new(key))
}

mod base64_bytes {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD.decode(raw).map_err(D::Error::custom)
    }
}
