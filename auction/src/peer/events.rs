//! Handling of events pushed by the coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AuctionError, AuctionResult};
use crate::marketplace::{AuctionId, AuctionType};
use crate::protocol::{Event, WireMessage};

/// What this peer last heard about one auction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionView {
    pub item: Option<String>,
    pub auction_type: Option<AuctionType>,
    pub current_price: u64,
    pub bid_count: usize,
    pub closed: bool,
    pub winner: Option<String>,
    pub final_price: Option<u64>,
    pub reason: Option<String>,
}

/// Tracks pushed events and acknowledges them.
///
/// Delivery is best effort and unordered across auctions, so a
/// `priceUpdate` arriving after `auctionClosed` is ignored.
#[derive(Debug, Clone, Default)]
pub struct PeerEventHandler {
    auctions: Arc<RwLock<HashMap<AuctionId, AuctionView>>>,
}

impl PeerEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&self, event: Event) {
        let mut auctions = self.auctions.write();
        match event {
            Event::NewAuction {
                auction_id,
                auction,
            } => {
                info!(
                    "New {} auction {}: '{}' starting at {}",
                    auction.auction_type, auction_id, auction.item, auction.start_price
                );
                auctions.insert(
                    auction_id,
                    AuctionView {
                        item: Some(auction.item),
                        auction_type: Some(auction.auction_type),
                        current_price: auction.current_price,
                        bid_count: auction.bids.len(),
                        closed: auction.closed,
                        ..AuctionView::default()
                    },
                );
            }
            Event::NewBid {
                auction_id,
                bid,
                auction_type,
                closed,
                current_price,
            } => {
                info!(
                    "New bid on {}: {} from {}",
                    auction_id, bid.amount, bid.bidder
                );
                let view = auctions.entry(auction_id).or_default();
                view.auction_type = Some(auction_type);
                view.current_price = current_price;
                view.bid_count += 1;
                view.closed |= closed;
            }
            Event::PriceUpdate {
                auction_id,
                current_price,
            } => {
                let view = auctions.entry(auction_id.clone()).or_default();
                if view.closed {
                    debug!("Ignoring price update for closed auction {auction_id}");
                } else {
                    debug!("Price of {auction_id} now {current_price}");
                    view.current_price = current_price;
                }
            }
            Event::AuctionClosed {
                auction_id,
                auction_type,
                highest_bid,
                winning_bid,
                final_price,
                reason,
            } => {
                let winner = winning_bid
                    .as_ref()
                    .map(|b| b.bidder.clone())
                    .or_else(|| highest_bid.as_ref().and_then(|h| h.bidder.clone()));
                info!(
                    "Auction {} closed ({}), winner: {}",
                    auction_id,
                    reason.as_deref().unwrap_or("no reason given"),
                    winner.as_deref().unwrap_or("none")
                );
                let view = auctions.entry(auction_id).or_default();
                view.auction_type = Some(auction_type);
                view.closed = true;
                view.winner = winner;
                view.final_price = final_price
                    .or_else(|| winning_bid.as_ref().map(|b| b.amount))
                    .or_else(|| {
                        highest_bid
                            .as_ref()
                            .filter(|h| !h.is_none())
                            .map(|h| h.amount)
                    });
                if let Some(price) = final_price {
                    view.current_price = price;
                }
                view.reason = reason;
            }
        }
    }

    /// Process an incoming call carrying an event and return the ack.
    pub fn process_call(&self, data: &[u8]) -> AuctionResult<Vec<u8>> {
        match WireMessage::from_bytes(data)? {
            WireMessage::Event(event) => {
                self.handle_event(event);
                WireMessage::EventAck.to_bytes()
            }
            other => {
                warn!("Peer received an unexpected frame: {other:?}");
                Err(AuctionError::InvalidParameter(
                    "expected an event frame".into(),
                ))
            }
        }
    }

    pub fn view(&self, auction_id: &str) -> Option<AuctionView> {
        self.auctions.read().get(auction_id).cloned()
    }

    pub fn known_auctions(&self) -> Vec<AuctionId> {
        self.auctions.read().keys().cloned().collect()
    }
}
