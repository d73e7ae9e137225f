//! Coordinator restart over the same store.

use auction::config::dutch_index_key;
use auction::coordinator::DutchIndex;
use auction::marketplace::CloseReason;
use auction::util::from_cbor;
use auction::AuctionError;

use crate::common::{AuctionHarness, COORDINATOR_ID};

#[tokio::test]
async fn test_state_survives_restart() {
    let harness = AuctionHarness::new(3).await;
    let english = harness.open_english(0, "Lamp", 100).await;
    harness.bid(1, &english, 150).await.unwrap();
    let open_dutch = harness.open_dutch(0, "Print", 500, 5, 250).await;
    let won_dutch = harness.open_dutch(0, "Poster", 300, 1, 0).await;
    harness.bid(2, &won_dutch, 300).await.unwrap();

    harness.restart_coordinator().await;
    let coordinator = harness.coordinator();
    let scheduler = coordinator.logic().scheduler();
    assert!(scheduler.is_running(&open_dutch));
    assert!(!scheduler.is_running(&won_dutch));
    assert_eq!(scheduler.active_count(), 1);

    let raw = harness
        .store()
        .raw(&dutch_index_key(COORDINATOR_ID))
        .await
        .unwrap();
    let index: DutchIndex = from_cbor(&raw).unwrap();
    assert_eq!(index.auctions, vec![open_dutch.clone()]);

    // registered peers and bids are still there
    assert_eq!(coordinator.directory().load().await.unwrap().len(), 3);
    let err = harness.bid(2, &english, 150).await.unwrap_err();
    assert!(matches!(err, AuctionError::BidTooLow { threshold: 150, .. }));
    harness.bid(2, &english, 151).await.unwrap();
    assert_eq!(harness.event_kinds(0, &english).await.last(), Some(&"newBid"));

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_decay_resumes_after_restart() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_dutch(0, "Print", 500, 5, 250).await;

    harness.restart_coordinator().await;
    harness.advance_time(100);
    assert!(harness.wait_for_close(&id, 10).await);

    let auction = harness.details(1, &id).await.unwrap();
    assert_eq!(auction.current_price, 250);
    assert_eq!(auction.close_reason, Some(CloseReason::MinimumPriceReached));
}
