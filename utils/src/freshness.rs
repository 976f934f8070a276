//! Staleness tracking for read-through caches.

use std::time::Duration;

use tokio::time::Instant;

/// A cached value stamped with the moment it was fetched.
#[derive(Debug, Clone)]
pub struct Fresh<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> Fresh<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// A value exactly at the bound is still usable.
    #[must_use]
    pub fn is_stale(&self, bound: Duration) -> bool {
        self.age() > bound
    }

    /// The value, if it is still within `bound`.
    #[must_use]
    pub fn get_within(&self, bound: Duration) -> Option<&T> {
        (!self.is_stale(bound)).then_some(&self.value)
    }
}
