//! Events that invalidate cached registry state and derived capabilities.

use council_types::Address;

/// Why cached state can no longer be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// The signer list changed on-chain.
    MembershipChanged,
    /// An owner's appointment or registered key changed on-chain.
    RegistryEntryChanged(Address),
    /// The wallet switched to another account.
    AccountSwitched(Address),
    /// The wallet disconnected.
    Disconnected,
}

impl InvalidationEvent {
    /// Session-level events end the current wallet session.
    #[must_use]
    pub const fn ends_session(self) -> bool {
        matches!(self, Self::AccountSwitched(_) | Self::Disconnected)
    }
}
