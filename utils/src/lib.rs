//! Shared infrastructure utilities for the council crates.
//!
//! - **`retry`**: One backoff policy for every remote read (registry, proposals, content store)
//! - **`freshness`**: Staleness bound for read-through caches

pub mod freshness;
pub mod retry;

pub use freshness::Fresh;
pub use retry::{RetryOutcome, RetryPolicy, Transient, calculate_retry_delay, retry_with_backoff};
