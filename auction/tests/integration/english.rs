//! English auction flows across several peers.

use auction::marketplace::{CloseReason, HighestBid};
use auction::{AuctionError, AuctionType, Event};

use crate::common::AuctionHarness;

#[tokio::test]
async fn test_ascending_bids_and_close() {
    let harness = AuctionHarness::new(3).await;
    let id = harness.open_english(0, "Antique Timepiece", 1000).await;

    let first = harness.bid(1, &id, 1100).await.unwrap();
    assert!(first.success);
    assert_eq!(first.current_price, 1100);
    assert!(!first.closed);

    let err = harness.bid(2, &id, 1050).await.unwrap_err();
    assert!(matches!(
        err,
        AuctionError::BidTooLow {
            threshold: 1100,
            strictly_greater: true
        }
    ));

    harness.bid(2, &id, 1200).await.unwrap();

    let outcome = harness.close(0, &id).await.unwrap();
    assert!(!outcome.already_closed);
    assert_eq!(outcome.result.auction_type, AuctionType::English);
    let highest = outcome.result.highest_bid.unwrap();
    assert_eq!(highest.bidder.as_deref(), Some("peer-2"));
    assert_eq!(highest.amount, 1200);

    let details = harness.details(1, &id).await.unwrap();
    assert!(details.closed);
    assert_eq!(details.bids.len(), 2);
    assert_eq!(details.close_reason, Some(CloseReason::ClosedBySeller));

    for peer in 0..harness.num_peers() {
        assert_eq!(
            harness.event_kinds(peer, &id).await,
            vec!["newAuction", "newBid", "newBid", "auctionClosed"]
        );
        let view = harness.view(peer, &id).unwrap();
        assert!(view.closed);
        assert_eq!(view.winner.as_deref(), Some("peer-2"));
        assert_eq!(view.final_price, Some(1200));
        assert_eq!(view.bid_count, 2);
    }
}

#[tokio::test]
async fn test_bid_must_exceed_start_price() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_english(0, "Lamp", 100).await;

    let err = harness.bid(1, &id, 100).await.unwrap_err();
    assert!(matches!(
        err,
        AuctionError::BidTooLow {
            threshold: 100,
            strictly_greater: true
        }
    ));
    harness.bid(1, &id, 101).await.unwrap();
}

#[tokio::test]
async fn test_close_without_bids_reports_sentinel() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_english(0, "Unwanted Vase", 50).await;

    let outcome = harness.close(0, &id).await.unwrap();
    assert_eq!(outcome.result.highest_bid, Some(HighestBid::none()));
    assert_eq!(outcome.result.winning_bid, None);

    let view = harness.view(1, &id).unwrap();
    assert!(view.closed);
    assert_eq!(view.winner, None);
    assert_eq!(view.final_price, None);
}

#[tokio::test]
async fn test_close_twice_returns_stored_result_silently() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_english(0, "Chair", 10).await;
    harness.bid(1, &id, 20).await.unwrap();

    let first = harness.close(0, &id).await.unwrap();
    let sent = harness.fanout().message_count().await;

    let second = harness.close(1, &id).await.unwrap();
    assert!(second.already_closed);
    assert_eq!(second.result, first.result);
    assert_eq!(harness.fanout().message_count().await, sent);
}

#[tokio::test]
async fn test_bid_after_close_rejected() {
    let harness = AuctionHarness::new(2).await;
    let id = harness.open_english(0, "Desk", 10).await;
    harness.close(0, &id).await.unwrap();

    let err = harness.bid(1, &id, 500).await.unwrap_err();
    assert!(matches!(err, AuctionError::AlreadyClosed(_)));
    assert!(harness.details(0, &id).await.unwrap().bids.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bids_keep_strict_ordering() {
    let harness = AuctionHarness::new(10).await;
    let id = harness.open_english(0, "Rare Stamp", 100).await;

    let handles: Vec<_> = (1..harness.num_peers())
        .map(|peer| {
            let amount = 100 + (peer as u64 * 7) % 13 + 1;
            harness.spawn_bid(peer, &id, amount)
        })
        .collect();
    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert!(outcome.success);
                accepted += 1;
            }
            Err(e) => assert!(matches!(e, AuctionError::BidTooLow { .. }), "{e}"),
        }
    }
    assert!(accepted >= 1);

    let auction = harness.details(0, &id).await.unwrap();
    assert_eq!(auction.bids.len(), accepted);
    let mut floor = auction.start_price;
    for bid in &auction.bids {
        assert!(bid.amount > floor);
        floor = bid.amount;
    }
    assert_eq!(auction.current_price, floor);

    // every peer saw the accepted bids in the order they were recorded
    let recorded: Vec<u64> = auction.bids.iter().map(|b| b.amount).collect();
    for peer in 0..harness.num_peers() {
        let seen: Vec<u64> = harness
            .events_of(peer)
            .await
            .into_iter()
            .filter_map(|e| match e {
                Event::NewBid { bid, .. } => Some(bid.amount),
                _ => None,
            })
            .collect();
        assert_eq!(seen, recorded);
    }
}
