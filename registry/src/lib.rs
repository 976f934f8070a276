//! Council membership, appointed agents and registered encryption keys.
//!
//! - `contract`: the registry contract seam ([`RegistryContract`])
//! - `client`: cached, retrying reads plus the two registration writes
//! - `events`: cache invalidation triggers
//! - `memory`: in-memory contract (tests and the `testkit` feature)

mod client;
mod contract;
mod events;
#[cfg(any(test, feature = "testkit"))]
mod memory;

pub use client::{RegistryClient, RegistryError};
pub use contract::{ChainError, ChainFuture, RegistryContract, RegistryEntry};
pub use events::InvalidationEvent;
#[cfg(any(test, feature = "testkit"))]
pub use memory::InMemoryRegistry;
