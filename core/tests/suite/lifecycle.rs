//! Create → approve → execute against in-memory collaborators.

use chrono::{Duration, Utc};
use council_core::{
    Commitment, CouncilError, ProposalContent, Recipients, actions_hash, metadata_hash,
};
use council_crypto::{WalletSigner, encrypt};
use council_store::ContentStore;
use council_types::{
    EmergencyProposal, Hash32, KeyTarget, ProposalId, ProposalParameters, ProposalStatus,
};

use crate::common::{Council, MIN_APPROVALS, Wallet, destination_plugin, metadata, transfer};

/// Council of three EOAs (1, 2, 3), each with its own registered key.
async fn registered_council() -> (Council, [Wallet; 3]) {
    let council = Council::new(&[1, 2, 3]);
    let wallets = [Wallet::new(1), Wallet::new(2), Wallet::new(3)];
    for wallet in &wallets {
        council
            .coordinator
            .register_public_key(wallet, KeyTarget::Own)
            .await
            .unwrap();
    }
    (council, wallets)
}

async fn create(council: &Council, creator: &Wallet) -> ProposalId {
    council
        .coordinator
        .create_proposal(
            creator,
            vec![transfer(9, 1_000)],
            metadata("Pause the bridge"),
            Recipients::EncryptionAgents,
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn full_lifecycle() {
    let (council, [a, b, c]) = registered_council().await;
    let coordinator = &council.coordinator;

    let created = coordinator
        .create_proposal(
            &a,
            vec![transfer(9, 1_000)],
            metadata("Pause the bridge"),
            Recipients::EncryptionAgents,
        )
        .await
        .unwrap();
    assert_eq!(created.recipient_count, 3);
    assert!(created.payload_uri.starts_with("ipfs://"));
    assert!(created.expires_at > Utc::now());

    let on_chain = council.proposals.snapshot(created.id).unwrap();
    assert_eq!(on_chain.destination_plugin, destination_plugin());
    assert_eq!(on_chain.actions_hash, actions_hash(&[transfer(9, 1_000)]).unwrap());
    assert_eq!(
        on_chain.public_metadata_hash,
        metadata_hash(&metadata("Pause the bridge")).unwrap()
    );
    assert_eq!(on_chain.status(Utc::now()), ProposalStatus::Submitted);
    assert_eq!(on_chain.expiration_date(), created.expires_at);

    // Every registered signer can read it before execution.
    let read = coordinator.read_proposal(&c, created.id).await.unwrap();
    assert_eq!(read.metadata.title.as_str(), "Pause the bridge");
    assert_eq!(read.actions, vec![transfer(9, 1_000)]);

    let approval = coordinator.approve(&b, created.id).await.unwrap();
    assert_eq!(approval.approver, b.address());
    coordinator.approve(&c, created.id).await.unwrap();

    let listed = coordinator.list_proposals().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, ProposalStatus::Approved);

    coordinator.execute(&a, created.id).await.unwrap();
    assert_eq!(council.proposals.execute_calls(), 1);
    let listed = coordinator.list_proposals().await.unwrap();
    assert_eq!(listed[0].status, ProposalStatus::Executed);

    let err = coordinator.execute(&a, created.id).await.unwrap_err();
    assert!(matches!(err, CouncilError::AlreadyExecuted(_)));
}

#[tokio::test]
async fn threshold_boundary() {
    let (council, [a, b, c]) = registered_council().await;
    let coordinator = &council.coordinator;
    let id = create(&council, &a).await;

    coordinator.approve(&b, id).await.unwrap();
    let err = coordinator.execute(&a, id).await.unwrap_err();
    match err {
        CouncilError::ThresholdNotReached {
            approvals,
            required,
            ..
        } => {
            assert_eq!(approvals, MIN_APPROVALS - 1);
            assert_eq!(required, MIN_APPROVALS);
        }
        other => panic!("expected ThresholdNotReached, got {other:?}"),
    }
    assert_eq!(council.proposals.execute_calls(), 0);

    coordinator.approve(&c, id).await.unwrap();
    coordinator.execute(&a, id).await.unwrap();
}

#[tokio::test]
async fn duplicate_approval_is_rejected() {
    let (council, [a, b, _]) = registered_council().await;
    let id = create(&council, &a).await;

    council.coordinator.approve(&b, id).await.unwrap();
    let err = council.coordinator.approve(&b, id).await.unwrap_err();
    assert!(matches!(err, CouncilError::AlreadyApproved { .. }));
    assert!(err.is_terminal_for_call());
    assert_eq!(council.proposals.snapshot(id).unwrap().approvals, 1);
}

#[tokio::test]
async fn expired_proposal_cannot_be_approved() {
    let (council, [_, b, _]) = registered_council().await;
    let expired_at = Utc::now() - Duration::hours(1);
    let id = council.proposals.insert(EmergencyProposal {
        id: ProposalId::new(0),
        executed: false,
        approvals: 1,
        parameters: ProposalParameters {
            snapshot_block: 1,
            expiration_date: expired_at,
            min_approvals: MIN_APPROVALS,
        },
        encrypted_payload_uri: "ipfs://unused".to_string(),
        public_metadata_hash: Hash32::new([0; 32]),
        actions_hash: Hash32::new([0; 32]),
        destination_plugin: destination_plugin(),
    });

    let listed = council.coordinator.list_proposals().await.unwrap();
    assert_eq!(listed[0].status, ProposalStatus::Expired);

    let err = council.coordinator.approve(&b, id).await.unwrap_err();
    assert!(matches!(err, CouncilError::ProposalExpired { .. }));
    assert_eq!(council.proposals.snapshot(id).unwrap().approvals, 1);
}

#[tokio::test]
async fn proposal_expiring_after_threshold_cannot_execute() {
    let (council, [a, b, c]) = registered_council().await;
    let id = create(&council, &a).await;
    council.coordinator.approve(&b, id).await.unwrap();
    council.coordinator.approve(&c, id).await.unwrap();

    council
        .proposals
        .set_expiration(id, Utc::now() - Duration::seconds(1));
    let err = council.coordinator.execute(&a, id).await.unwrap_err();
    assert!(matches!(err, CouncilError::ProposalExpired { .. }));
    assert_eq!(council.proposals.execute_calls(), 0);
}

#[tokio::test]
async fn tampered_actions_block_execution() {
    let (council, [a, b, c]) = registered_council().await;
    let created = council
        .coordinator
        .create_proposal(
            &a,
            vec![transfer(9, 1_000)],
            metadata("Pause the bridge"),
            Recipients::EncryptionAgents,
        )
        .await
        .unwrap();
    council.coordinator.approve(&b, created.id).await.unwrap();
    council.coordinator.approve(&c, created.id).await.unwrap();

    // Re-encrypt different actions for the same recipients under the same URI.
    let recipients = council
        .coordinator
        .registry()
        .encryption_recipients()
        .await
        .unwrap();
    let forged = ProposalContent {
        metadata: metadata("Pause the bridge"),
        actions: vec![transfer(0x66, 1_000_000)],
    };
    let payload = encrypt(&forged.to_bytes().unwrap(), &recipients).unwrap();
    council
        .store
        .replace(&created.payload_uri, payload.to_bytes().unwrap())
        .unwrap();

    let err = council.coordinator.execute(&a, created.id).await.unwrap_err();
    assert!(matches!(
        err,
        CouncilError::IntegrityViolation {
            commitment: Commitment::Actions,
            ..
        }
    ));
    assert_eq!(council.proposals.execute_calls(), 0);
    assert!(!council.proposals.snapshot(created.id).unwrap().executed);
}

#[tokio::test]
async fn tampered_metadata_is_detected_on_read() {
    let (council, [a, b, _]) = registered_council().await;
    let created = council
        .coordinator
        .create_proposal(
            &a,
            vec![transfer(9, 1)],
            metadata("Original"),
            Recipients::EncryptionAgents,
        )
        .await
        .unwrap();

    let recipients = council
        .coordinator
        .registry()
        .encryption_recipients()
        .await
        .unwrap();
    let forged = ProposalContent {
        metadata: metadata("Forged"),
        actions: vec![transfer(9, 1)],
    };
    let payload = encrypt(&forged.to_bytes().unwrap(), &recipients).unwrap();
    council
        .store
        .replace(&created.payload_uri, payload.to_bytes().unwrap())
        .unwrap();

    let err = council
        .coordinator
        .read_proposal(&b, created.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CouncilError::IntegrityViolation {
            commitment: Commitment::PublicMetadata,
            ..
        }
    ));
}

#[tokio::test]
async fn non_recipient_cannot_decrypt() {
    let (council, [a, b, _]) = registered_council().await;
    let a_key = council
        .coordinator
        .registry()
        .get_account(a.address())
        .await
        .unwrap()
        .registered_public_key
        .unwrap();

    let created = council
        .coordinator
        .create_proposal(
            &a,
            vec![transfer(9, 1)],
            metadata("Only for A"),
            Recipients::Explicit(vec![a_key]),
        )
        .await
        .unwrap();
    assert_eq!(created.recipient_count, 1);

    council.coordinator.read_proposal(&a, created.id).await.unwrap();
    let err = council
        .coordinator
        .read_proposal(&b, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::DecryptionFailed(_)));
}

#[tokio::test]
async fn empty_recipient_list_is_an_encryption_error() {
    let (council, [a, _, _]) = registered_council().await;
    let err = council
        .coordinator
        .create_proposal(
            &a,
            vec![transfer(9, 1)],
            metadata("Nobody"),
            Recipients::Explicit(Vec::new()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::EncryptionError(_)));
    assert!(council.store.is_empty());
    assert!(council.coordinator.list_proposals().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_creation_leaves_no_proposal() {
    let (council, [a, _, _]) = registered_council().await;
    council.proposals.reject_next_write();
    let err = council
        .coordinator
        .create_proposal(
            &a,
            vec![transfer(9, 1)],
            metadata("Cancelled"),
            Recipients::EncryptionAgents,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::UserRejected));
    assert!(council.coordinator.list_proposals().await.unwrap().is_empty());
}

#[tokio::test]
async fn lagging_gateway_is_tolerated() {
    let (council, [a, b, _]) = registered_council().await;
    let id = create(&council, &a).await;
    council.store.delay_visibility(2);

    let read = council.coordinator.read_proposal(&b, id).await.unwrap();
    assert_eq!(read.proposal.id, id);
    assert!(council.store.get_calls() >= 3);
}

#[tokio::test]
async fn unknown_proposal_is_reported() {
    let (council, [a, _, _]) = registered_council().await;
    let err = council
        .coordinator
        .approve(&a, ProposalId::new(42))
        .await
        .unwrap_err();
    assert!(matches!(err, CouncilError::ProposalNotFound(_)));
}

#[tokio::test]
async fn uri_returned_by_store_resolves_to_payload() {
    let (council, [a, _, _]) = registered_council().await;
    let id = create(&council, &a).await;
    let uri = council.proposals.snapshot(id).unwrap().encrypted_payload_uri;
    let bytes = council.store.get(&uri).await.unwrap();
    assert!(!bytes.is_empty());
}
