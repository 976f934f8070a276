//! In-memory content store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use sha2::{Digest, Sha256};

use crate::{ContentStore, IPFS_SCHEME, StoreError, StoreFuture, parse_cid};

/// Stores blobs under `ipfs://` URIs derived from their SHA-256.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    hidden_reads: AtomicU32,
    get_calls: AtomicU32,
}

impl InMemoryContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `reads` gets answer 404, as a lagging gateway would.
    pub fn delay_visibility(&self, reads: u32) {
        self.hidden_reads.store(reads, Ordering::SeqCst);
    }

    /// Overwrite the blob behind `uri`, bypassing content addressing.
    pub fn replace(&self, uri: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let cid = parse_cid(uri)?.to_string();
        self.blobs().insert(cid, bytes);
        Ok(())
    }

    #[must_use]
    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ContentStore for InMemoryContentStore {
    fn put<'a>(&'a self, bytes: &'a [u8]) -> StoreFuture<'a, String> {
        Box::pin(async move {
            let cid = hex::encode(Sha256::digest(bytes));
            self.blobs().insert(cid.clone(), bytes.to_vec());
            Ok(format!("{IPFS_SCHEME}{cid}"))
        })
    }

    fn get<'a>(&'a self, uri: &'a str) -> StoreFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let cid = parse_cid(uri)?;
            let hidden = self.hidden_reads.load(Ordering::SeqCst);
            if hidden > 0 {
                self.hidden_reads.store(hidden - 1, Ordering::SeqCst);
                return Err(StoreError::Status {
                    status: 404,
                    uri: uri.to_string(),
                });
            }
            self.blobs()
                .get(cid)
                .cloned()
                .ok_or_else(|| StoreError::Status {
                    status: 404,
                    uri: uri.to_string(),
                })
        })
    }
}
