//! Capability gating through the coordinator.

use council_core::{CapabilityStatus, CouncilError, Operation, Recipients};
use council_crypto::WalletSigner;
use council_registry::InvalidationEvent;
use council_types::KeyTarget;

use crate::common::{Council, Wallet, addr, metadata, transfer};

#[tokio::test]
async fn contract_owner_without_agent_must_appoint() {
    let council = Council::new(&[1]);
    council.registry.mark_contract(addr(1));
    assert_eq!(
        council.coordinator.capability(addr(1)).await,
        CapabilityStatus::CtaOwnerMustAppoint
    );

    let err = council
        .coordinator
        .create_proposal(
            &Wallet::new(1),
            vec![transfer(9, 1)],
            metadata("Blocked"),
            Recipients::EncryptionAgents,
        )
        .await
        .unwrap_err();
    match err {
        CouncilError::CapabilityDenied { operation, status } => {
            assert_eq!(operation, Operation::Create);
            assert_eq!(status, CapabilityStatus::CtaOwnerMustAppoint);
        }
        other => panic!("expected CapabilityDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn eoa_owner_with_nothing_must_appoint_or_register() {
    let council = Council::new(&[1]);
    assert_eq!(
        council.coordinator.capability(addr(1)).await,
        CapabilityStatus::CtaOwnerMustAppointOrRegisterPubKey
    );

    council
        .coordinator
        .register_public_key(&Wallet::new(1), KeyTarget::Own)
        .await
        .unwrap();
    assert_eq!(
        council.coordinator.capability(addr(1)).await,
        CapabilityStatus::ReadyAll
    );
}

#[tokio::test]
async fn reappointment_clears_registered_key() {
    let council = Council::new(&[1]);
    let owner = Wallet::new(1);
    council
        .coordinator
        .register_public_key(&owner, KeyTarget::Own)
        .await
        .unwrap();

    council
        .coordinator
        .appoint_agent(&owner, addr(2))
        .await
        .unwrap();
    let account = council.coordinator.registry().get_account(addr(1)).await.unwrap();
    assert_eq!(account.appointed_agent, Some(addr(2)));
    assert_eq!(account.registered_public_key, None);
    assert_eq!(
        council.coordinator.capability(addr(1)).await,
        CapabilityStatus::WarnAppointedMustRegisterPubKey
    );
}

#[tokio::test]
async fn smart_wallet_signer_works_through_its_agent() {
    let council = Council::new(&[1, 3]);
    council.registry.mark_contract(addr(1));
    let multisig = Wallet::new(1);
    let agent = Wallet::new(2);
    let other = Wallet::new(3);

    council
        .coordinator
        .appoint_agent(&multisig, agent.address())
        .await
        .unwrap();
    council
        .coordinator
        .register_public_key(&agent, KeyTarget::Appointed)
        .await
        .unwrap();
    council
        .coordinator
        .register_public_key(&other, KeyTarget::Own)
        .await
        .unwrap();

    assert_eq!(
        council.coordinator.capability(multisig.address()).await,
        CapabilityStatus::ReadyCanCreate
    );
    assert_eq!(
        council.coordinator.capability(agent.address()).await,
        CapabilityStatus::ReadyAll
    );

    // The multisig creates and approves but cannot read.
    let created = council
        .coordinator
        .create_proposal(
            &multisig,
            vec![transfer(9, 5)],
            metadata("Rotate oracle"),
            Recipients::EncryptionAgents,
        )
        .await
        .unwrap();
    assert_eq!(created.recipient_count, 2);
    council.coordinator.approve(&multisig, created.id).await.unwrap();
    council.coordinator.approve(&other, created.id).await.unwrap();

    let err = council
        .coordinator
        .execute(&multisig, created.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CouncilError::CapabilityDenied {
            operation: Operation::Decrypt,
            ..
        }
    ));

    // Its agent decrypts and executes.
    council.coordinator.execute(&agent, created.id).await.unwrap();
}

#[tokio::test]
async fn refused_appointment_is_a_cancellation() {
    let council = Council::new(&[1]);
    council.registry.reject_next_write();
    let err = council
        .coordinator
        .appoint_agent(&Wallet::new(1), addr(2))
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::UserRejected));
    assert_eq!(
        council.coordinator.capability(addr(1)).await,
        CapabilityStatus::CtaOwnerMustAppointOrRegisterPubKey
    );
}

#[tokio::test]
async fn refused_key_registration_leaves_no_session_key() {
    let council = Council::new(&[1]);
    council.registry.reject_next_write();
    let err = council
        .coordinator
        .register_public_key(&Wallet::new(1), KeyTarget::Own)
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::UserRejected));
    assert!(council.coordinator.session().keys().await.is_none());
}

#[tokio::test]
async fn smart_wallet_cannot_be_appointed() {
    let council = Council::new(&[1]);
    council.registry.mark_contract(addr(2));
    let err = council
        .coordinator
        .appoint_agent(&Wallet::new(1), addr(2))
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::RegistryWriteError(_)));
}

#[tokio::test]
async fn stranger_is_denied_everything() {
    let council = Council::new(&[1]);
    let stranger = Wallet::new(7);
    assert_eq!(
        council.coordinator.capability(stranger.address()).await,
        CapabilityStatus::ErrorNotListedOrAppointed
    );
    let err = council
        .coordinator
        .register_public_key(&stranger, KeyTarget::Own)
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::RegistryWriteError(_)));
}

#[tokio::test]
async fn randomized_wallet_cannot_register() {
    let council = Council::new(&[1]);
    let err = council
        .coordinator
        .register_public_key(&Wallet::randomized(1), KeyTarget::Own)
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::SignatureError(_)));
    assert!(council.coordinator.session().keys().await.is_none());
    assert_eq!(
        council.coordinator.capability(addr(1)).await,
        CapabilityStatus::CtaOwnerMustAppointOrRegisterPubKey
    );
}

#[tokio::test]
async fn registry_outage_is_load_failed() {
    let council = Council::new(&[1]);
    council.registry.fail_next_reads(10);
    assert_eq!(
        council.coordinator.capability(addr(1)).await,
        CapabilityStatus::ErrorLoadFailed
    );
}

#[tokio::test]
async fn monitor_follows_registration() {
    let council = Council::new(&[1]);
    let monitor = council.coordinator.monitor();
    let mut updates = monitor.subscribe();
    assert_eq!(
        monitor.connect(addr(1)).await,
        CapabilityStatus::CtaOwnerMustAppointOrRegisterPubKey
    );

    council
        .coordinator
        .register_public_key(&Wallet::new(1), KeyTarget::Own)
        .await
        .unwrap();
    monitor
        .handle(InvalidationEvent::RegistryEntryChanged(addr(1)))
        .await;
    assert_eq!(*updates.borrow_and_update(), CapabilityStatus::ReadyAll);

    monitor.handle(InvalidationEvent::Disconnected).await;
    assert!(council.coordinator.session().keys().await.is_none());
}
