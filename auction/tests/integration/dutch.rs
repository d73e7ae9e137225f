//! Dutch auction flows: live price, first-bid-wins, decay to the floor.

use std::time::Duration;

use auction::marketplace::CloseReason;
use auction::{AuctionError, AuctionType, Event};

use crate::common::{AuctionHarness, DECAY_PERIOD};

#[tokio::test]
async fn test_bid_at_start_price_wins_immediately() {
    let harness = AuctionHarness::new(3).await;
    let id = harness.open_dutch(0, "Print", 500, 5, 250).await;
    assert!(harness.coordinator().logic().scheduler().is_running(&id));

    let outcome = harness.bid(1, &id, 500).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.closed);
    assert_eq!(outcome.current_price, 500);
    assert!(!harness.coordinator().logic().scheduler().is_running(&id));

    let details = harness.details(2, &id).await.unwrap();
    assert!(details.closed);
    assert_eq!(details.winner.as_deref(), Some("peer-1"));
    assert_eq!(details.final_price, Some(500));
    assert_eq!(details.close_reason, Some(CloseReason::WinningBid));

    for peer in 0..harness.num_peers() {
        assert_eq!(
            harness.event_kinds(peer, &id).await,
            vec!["newAuction", "auctionClosed"]
        );
        let view = harness.view(peer, &id).unwrap();
        assert_eq!(view.auction_type, Some(AuctionType::Dutch));
        assert_eq!(view.winner.as_deref(), Some("peer-1"));
        assert_eq!(view.final_price, Some(500));
        assert_eq!(view.reason.as_deref(), Some("winning bid accepted"));
    }
}

#[tokio::test]
async fn test_bid_below_live_price_rejected() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_dutch(0, "Print", 500, 5, 250).await;
    harness.advance_time(10);

    // live price is 450 after ten seconds
    let details = harness.details(1, &id).await.unwrap();
    assert_eq!(details.current_price, 450);
    assert!(!details.closed);

    let err = harness.bid(1, &id, 449).await.unwrap_err();
    assert!(matches!(
        err,
        AuctionError::BidTooLow {
            threshold: 450,
            strictly_greater: false
        }
    ));

    let outcome = harness.bid(1, &id, 450).await.unwrap();
    assert!(outcome.closed);
    assert_eq!(outcome.current_price, 450);
}

#[tokio::test]
async fn test_details_do_not_write() {
    let harness = AuctionHarness::new(1).await;
    let id = harness.open_dutch(0, "Print", 500, 5, 250).await;
    harness.advance_time(20);

    let writes = harness.store().write_count();
    assert_eq!(harness.details(0, &id).await.unwrap().current_price, 400);
    assert_eq!(harness.details(0, &id).await.unwrap().current_price, 400);
    assert_eq!(harness.store().write_count(), writes);
}

#[tokio::test]
async fn test_seller_close_ends_dutch_auction() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_dutch(0, "Print", 500, 5, 250).await;

    harness.close(0, &id).await.unwrap();
    let err = harness.bid(1, &id, 500).await.unwrap_err();
    assert!(matches!(err, AuctionError::AlreadyClosed(_)));

    let outcome = harness.close(1, &id).await.unwrap();
    assert!(outcome.already_closed);
    assert_eq!(outcome.result.winning_bid, None);
    assert_eq!(outcome.result.highest_bid, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bids_single_winner() {
    let harness = AuctionHarness::new(8).await;
    let id = harness.open_dutch(0, "Print", 500, 5, 250).await;
    harness
        .store()
        .set_read_latency(Some(Duration::from_millis(5)))
        .await;

    let handles: Vec<_> = (1..harness.num_peers())
        .map(|peer| harness.spawn_bid(peer, &id, 500))
        .collect();
    let mut winners = Vec::new();
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert!(outcome.closed);
                winners.push(format!("peer-{}", i + 1));
            }
            Err(e) => assert!(matches!(e, AuctionError::AlreadyClosed(_)), "{e}"),
        }
    }
    assert_eq!(winners.len(), 1);

    let auction = harness.details(0, &id).await.unwrap();
    assert_eq!(auction.bids.len(), 1);
    assert_eq!(auction.winner.as_ref(), winners.first());

    // exactly one close notification per peer
    for peer in 0..harness.num_peers() {
        let closes = harness
            .event_kinds(peer, &id)
            .await
            .into_iter()
            .filter(|k| *k == "auctionClosed")
            .count();
        assert_eq!(closes, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_decay_runs_down_to_floor() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_dutch(0, "Print", 500, 5, 250).await;

    // keep the auction clock in step with the scheduler
    for _ in 0..4 {
        harness.advance_time(DECAY_PERIOD.as_secs());
        tokio::time::sleep(DECAY_PERIOD).await;
    }
    harness.advance_time(60);
    assert!(harness.wait_for_close(&id, 10).await);

    let auction = harness.details(0, &id).await.unwrap();
    assert!(auction.closed);
    assert_eq!(auction.current_price, 250);
    assert_eq!(auction.winner, None);
    assert_eq!(auction.close_reason, Some(CloseReason::MinimumPriceReached));

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!harness.coordinator().logic().scheduler().is_running(&id));

    for peer in 0..harness.num_peers() {
        let events = harness.events_of(peer).await;
        let prices: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                Event::PriceUpdate { current_price, .. } => Some(*current_price),
                _ => None,
            })
            .collect();
        assert!(!prices.is_empty());
        assert!(prices.windows(2).all(|w| w[0] >= w[1]));
        assert!(prices.iter().all(|p| (250..500).contains(p)));

        let kinds = harness.event_kinds(peer, &id).await;
        assert_eq!(kinds.first(), Some(&"newAuction"));
        assert_eq!(kinds.last(), Some(&"auctionClosed"));

        let view = harness.view(peer, &id).unwrap();
        assert!(view.closed);
        assert_eq!(view.winner, None);
        assert_eq!(view.reason.as_deref(), Some("minimum price reached"));
    }

    // no further ticks once closed
    let sent = harness.fanout().message_count().await;
    tokio::time::sleep(DECAY_PERIOD * 3).await;
    assert_eq!(harness.fanout().message_count().await, sent);
}

#[tokio::test(start_paused = true)]
async fn test_decay_stops_after_winning_bid() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_dutch(0, "Print", 500, 5, 250).await;

    harness.advance_time(5);
    tokio::time::sleep(DECAY_PERIOD).await;
    harness.bid(1, &id, 480).await.unwrap();

    let sent = harness.fanout().message_count().await;
    harness.advance_time(30);
    tokio::time::sleep(DECAY_PERIOD * 4).await;
    assert_eq!(harness.fanout().message_count().await, sent);

    let auction = harness.details(0, &id).await.unwrap();
    assert_eq!(auction.current_price, 480);
    assert_eq!(auction.close_reason, Some(CloseReason::WinningBid));
}
