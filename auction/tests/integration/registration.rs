//! Peer registration against a live coordinator.

use std::time::Duration;

use auction::mocks::{MockStoreFailure, MockTransport, PeerBehavior};
use auction::protocol::{Response, WireMessage};
use auction::{AuctionError, RegistrationClient};

use crate::common::{AuctionHarness, COORDINATOR_ADDRESS};

#[tokio::test]
async fn test_registering_twice_is_harmless() {
    let harness = AuctionHarness::new(3).await;
    let peer_id = harness.peer(1).peer_id.clone();

    harness.peer(1).client.register_client(&peer_id).await.unwrap();

    let directory = harness.coordinator().directory().load().await.unwrap();
    assert_eq!(directory.len(), 3);
    assert!(directory.contains(&peer_id));

    let id = harness.open_english(0, "Map", 10).await;
    assert_eq!(harness.event_kinds(1, &id).await, vec!["newAuction"]);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_coordinator_exhausts_retries() {
    let transport = MockTransport::new();
    transport
        .set_behavior(COORDINATOR_ADDRESS, PeerBehavior::Fail)
        .await;

    let start = tokio::time::Instant::now();
    let err = RegistrationClient::new(transport.clone())
        .register(&COORDINATOR_ADDRESS.to_string(), "peer-x")
        .await
        .unwrap_err();

    match err {
        AuctionError::RegistrationExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 5);
            assert!(last_error.contains("unreachable"), "{last_error}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.attempts_to(COORDINATOR_ADDRESS).await, 5);
    // four pauses between five attempts
    assert_eq!(start.elapsed(), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let transport = MockTransport::new().with_responder(|_, _| {
        WireMessage::Response(Response::Registered { success: true }).to_bytes()
    });
    transport
        .set_behavior(COORDINATOR_ADDRESS, PeerBehavior::FailTimes(2))
        .await;

    RegistrationClient::new(transport.clone())
        .with_retry(3, Duration::from_secs(1))
        .register(&COORDINATOR_ADDRESS.to_string(), "peer-x")
        .await
        .unwrap();
    assert_eq!(transport.attempts_to(COORDINATOR_ADDRESS).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_directory_write_failure_is_retried() {
    let mut harness = AuctionHarness::new(1).await;
    harness
        .store()
        .set_fail_mode(Some(MockStoreFailure::Writes))
        .await;

    let err = RegistrationClient::new(harness.loopback())
        .with_retry(2, Duration::from_secs(1))
        .register(&COORDINATOR_ADDRESS.to_string(), "newcomer")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuctionError::RegistrationExhausted { attempts: 2, .. }
    ));

    harness.store().set_fail_mode(None).await;
    let index = harness.add_peer().await;
    let directory = harness.coordinator().directory().load().await.unwrap();
    assert!(!directory.contains("newcomer"));
    assert!(directory.contains(&harness.peer(index).peer_id));
}
