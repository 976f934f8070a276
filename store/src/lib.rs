//! Content-addressed storage for encrypted proposal payloads.
//!
//! Payloads are published once with [`ContentStore::put`] and read back by
//! URI. Gateways can lag behind the node that accepted the upload, so reads
//! go through [`fetch_with_retry`] and treat "not found yet" as transient.

mod http;
#[cfg(any(test, feature = "testkit"))]
mod memory;

use std::future::Future;
use std::pin::Pin;

use council_utils::{RetryOutcome, RetryPolicy, Transient, retry_with_backoff};
use thiserror::Error;

pub use http::HttpContentStore;
#[cfg(any(test, feature = "testkit"))]
pub use memory::InMemoryContentStore;

/// URI scheme produced by content-addressed uploads.
pub const IPFS_SCHEME: &str = "ipfs://";

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("content store unreachable: {0}")]
    Transport(String),
    #[error("content store returned HTTP {status} for {uri}")]
    Status { status: u16, uri: String },
    #[error("invalid content URI `{0}`")]
    InvalidUri(String),
    #[error("unexpected content store response: {0}")]
    Malformed(String),
    #[error("content {uri} unavailable after {attempts} attempt(s): {reason}")]
    Unavailable {
        uri: String,
        attempts: u32,
        reason: String,
    },
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            // 404 covers gateways that have not seen the upload yet.
            Self::Status { status, .. } => {
                matches!(status, 404 | 408 | 429 | 500 | 502 | 503 | 504 | 520..=599)
            }
            Self::InvalidUri(_) | Self::Malformed(_) | Self::Unavailable { .. } => false,
        }
    }
}

/// Content-addressed blob storage.
pub trait ContentStore: Send + Sync {
    /// Store `bytes` and return the URI they can be fetched from.
    fn put<'a>(&'a self, bytes: &'a [u8]) -> StoreFuture<'a, String>;
    fn get<'a>(&'a self, uri: &'a str) -> StoreFuture<'a, Vec<u8>>;
}

/// Fetch `uri`, retrying transient failures under `policy`.
pub async fn fetch_with_retry(
    store: &dyn ContentStore,
    uri: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, StoreError> {
    match retry_with_backoff("content_get", policy, || store.get(uri)).await {
        RetryOutcome::Success(bytes) => Ok(bytes),
        RetryOutcome::NonRetryable(err) => Err(err),
        RetryOutcome::Exhausted { attempts, source } => Err(StoreError::Unavailable {
            uri: uri.to_string(),
            attempts,
            reason: source.to_string(),
        }),
    }
}

/// Content identifier inside an `ipfs://` URI.
pub fn parse_cid(uri: &str) -> Result<&str, StoreError> {
    uri.strip_prefix(IPFS_SCHEME)
        .map(|rest| rest.trim_end_matches('/'))
        .filter(|cid| !cid.is_empty() && !cid.contains(['/', '?', '#']))
        .ok_or_else(|| StoreError::InvalidUri(uri.to_string()))
}
