//! What an address may do with emergency proposals right now.
//!
//! [`classify`] is a pure decision table over [`CapabilityInputs`]. Rows are
//! evaluated top to bottom, so a load failure always wins over a missing key,
//! and a missing membership always wins over anything the registry says
//! about appointments.

use std::fmt;

use council_registry::{RegistryClient, RegistryError};
use council_types::Address;

/// Facts the classifier decides on. Assembled by [`resolve_inputs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityInputs {
    pub is_loading: bool,
    pub had_load_error: bool,
    pub is_listed_signer: bool,
    /// Appointed as decryption agent by some listed signer.
    pub is_appointed_agent: bool,
    /// The address itself carries contract code.
    pub target_is_contract: bool,
    /// For a signer: it has appointed an agent.
    pub has_appointed_agent: bool,
    /// A key is registered on the owner record this address decrypts for.
    pub has_registered_key: bool,
}

impl CapabilityInputs {
    #[must_use]
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn load_failed() -> Self {
        Self {
            had_load_error: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityStatus {
    Loading,
    ErrorLoadFailed,
    ErrorNotListedOrAppointed,
    ErrorAppointedASmartWalletCannotGeneratePublicKey,
    CtaAppointedMustRegisterPubKey,
    CtaOwnerMustAppoint,
    CtaOwnerMustAppointOrRegisterPubKey,
    WarnAppointedMustRegisterPubKey,
    ReadyCanCreate,
    ReadyAll,
}

impl CapabilityStatus {
    #[must_use]
    pub const fn can_create(self) -> bool {
        matches!(self, Self::ReadyCanCreate | Self::ReadyAll)
    }

    #[must_use]
    pub const fn can_approve(self) -> bool {
        self.can_create()
    }

    /// Only an identity whose own derived key is registered can open payloads.
    #[must_use]
    pub const fn can_decrypt(self) -> bool {
        matches!(self, Self::ReadyAll)
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::ErrorLoadFailed
                | Self::ErrorNotListedOrAppointed
                | Self::ErrorAppointedASmartWalletCannotGeneratePublicKey
        )
    }

    /// The user has something to do before becoming fully capable.
    #[must_use]
    pub const fn needs_action(self) -> bool {
        matches!(
            self,
            Self::CtaAppointedMustRegisterPubKey
                | Self::CtaOwnerMustAppoint
                | Self::CtaOwnerMustAppointOrRegisterPubKey
                | Self::WarnAppointedMustRegisterPubKey
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::ErrorLoadFailed => "ERROR_LOAD_FAILED",
            Self::ErrorNotListedOrAppointed => "ERROR_NOT_LISTED_OR_APPOINTED",
            Self::ErrorAppointedASmartWalletCannotGeneratePublicKey => {
                "ERROR_APPOINTED_A_SMART_WALLET_CANNOT_GENERATE_PUBLIC_KEY"
            }
            Self::CtaAppointedMustRegisterPubKey => "CTA_APPOINTED_MUST_REGISTER_PUB_KEY",
            Self::CtaOwnerMustAppoint => "CTA_OWNER_MUST_APPOINT",
            Self::CtaOwnerMustAppointOrRegisterPubKey => {
                "CTA_OWNER_MUST_APPOINT_OR_REGISTER_PUB_KEY"
            }
            Self::WarnAppointedMustRegisterPubKey => "WARN_APPOINTED_MUST_REGISTER_PUB_KEY",
            Self::ReadyCanCreate => "READY_CAN_CREATE",
            Self::ReadyAll => "READY_ALL",
        }
    }
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gated operations, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Approve,
    Decrypt,
}

impl Operation {
    #[must_use]
    pub const fn allowed_by(self, status: CapabilityStatus) -> bool {
        match self {
            Self::Create => status.can_create(),
            Self::Approve => status.can_approve(),
            Self::Decrypt => status.can_decrypt(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create proposals",
            Self::Approve => "approve proposals",
            Self::Decrypt => "decrypt proposals",
        })
    }
}

#[must_use]
pub const fn classify(inputs: &CapabilityInputs) -> CapabilityStatus {
    use CapabilityStatus as S;

    let CapabilityInputs {
        is_loading,
        had_load_error,
        is_listed_signer,
        is_appointed_agent,
        target_is_contract,
        has_appointed_agent,
        has_registered_key,
    } = *inputs;

    if is_loading {
        return S::Loading;
    }
    if had_load_error {
        return S::ErrorLoadFailed;
    }

    match (is_listed_signer, is_appointed_agent) {
        (false, false) => S::ErrorNotListedOrAppointed,

        // ── Appointed agent, not itself listed ──
        (false, true) => match (has_registered_key, target_is_contract) {
            (true, _) => S::ReadyAll,
            (false, true) => S::ErrorAppointedASmartWalletCannotGeneratePublicKey,
            (false, false) => S::CtaAppointedMustRegisterPubKey,
        },

        // ── Listed contract: only an agent can hold the key ──
        (true, _) if target_is_contract => match (has_appointed_agent, has_registered_key) {
            (false, _) => S::CtaOwnerMustAppoint,
            (true, false) => S::WarnAppointedMustRegisterPubKey,
            (true, true) => S::ReadyCanCreate,
        },

        // ── Listed externally-owned account ──
        (true, _) => match (has_appointed_agent, has_registered_key) {
            (false, false) => S::CtaOwnerMustAppointOrRegisterPubKey,
            (false, true) => S::ReadyAll,
            (true, false) => S::WarnAppointedMustRegisterPubKey,
            (true, true) => S::ReadyCanCreate,
        },
    }
}

/// Gather classifier inputs for `address` from the registry.
///
/// Read failures become `had_load_error`; they are logged, not returned,
/// because the error itself is a classifier state.
pub async fn resolve_inputs(registry: &RegistryClient, address: Address) -> CapabilityInputs {
    match try_resolve_inputs(registry, address).await {
        Ok(inputs) => inputs,
        Err(err) => {
            tracing::warn!(%address, error = %err, "Failed to load capability inputs");
            CapabilityInputs::load_failed()
        }
    }
}

async fn try_resolve_inputs(
    registry: &RegistryClient,
    address: Address,
) -> Result<CapabilityInputs, RegistryError> {
    if registry.is_listed_signer(address).await? {
        let account = registry.get_account(address).await?;
        return Ok(CapabilityInputs {
            is_listed_signer: true,
            target_is_contract: account.is_contract,
            has_appointed_agent: account.has_appointed_agent(),
            has_registered_key: account.has_registered_key(),
            ..CapabilityInputs::default()
        });
    }

    let Some(owner) = registry.find_appointer(address).await? else {
        return Ok(CapabilityInputs::default());
    };
    let owner_account = registry.get_account(owner).await?;
    Ok(CapabilityInputs {
        is_appointed_agent: true,
        target_is_contract: registry.is_contract(address).await?,
        has_registered_key: owner_account.has_registered_key(),
        ..CapabilityInputs::default()
    })
}

/// Classify `address` against current registry state.
pub async fn capability_of(registry: &RegistryClient, address: Address) -> CapabilityStatus {
    classify(&resolve_inputs(registry, address).await)
}
