//! Typed request client a peer uses to talk to its coordinator.

use std::time::Duration;

use crate::config::REQUEST_TIMEOUT_SECS;
use crate::error::{AuctionError, AuctionResult};
use crate::marketplace::{Auction, AuctionId};
use crate::protocol::{BidOutcome, CloseOutcome, Request, Response, WireMessage};
use crate::traits::{MessageTransport, PeerId};

/// Sends requests to one coordinator and decodes its replies.
///
/// Error replies come back as the matching [`AuctionError`].
#[derive(Clone)]
pub struct PeerClient<T: MessageTransport> {
    transport: T,
    coordinator: PeerId,
    timeout: Duration,
}

impl<T: MessageTransport> PeerClient<T> {
    pub fn new(transport: T, coordinator: impl Into<PeerId>) -> Self {
        Self {
            transport,
            coordinator: coordinator.into(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn coordinator(&self) -> &PeerId {
        &self.coordinator
    }

    /// Send one request and return the successful response.
    pub async fn call(&self, request: Request) -> AuctionResult<Response> {
        let data = WireMessage::Request(request).to_bytes()?;
        let reply = self
            .transport
            .request(&self.coordinator, data, self.timeout)
            .await?;
        match WireMessage::expect_response(&reply)? {
            Response::Error(reply) => Err(reply.into_error()),
            response => Ok(response),
        }
    }

    pub async fn register_client(&self, peer_id: &str) -> AuctionResult<bool> {
        match self
            .call(Request::RegisterClient {
                peer_id: peer_id.to_string(),
            })
            .await?
        {
            Response::Registered { success } => Ok(success),
            other => Err(unexpected("registerClient", &other)),
        }
    }

    pub async fn open_auction(
        &self,
        item: &str,
        price: u64,
        auction_type: &str,
        decrement_rate: Option<u64>,
        minimum_price: Option<u64>,
    ) -> AuctionResult<AuctionId> {
        match self
            .call(Request::OpenAuction {
                item: item.to_string(),
                price,
                auction_type: auction_type.to_string(),
                decrement_rate,
                minimum_price,
            })
            .await?
        {
            Response::AuctionOpened { auction_id } => Ok(auction_id),
            other => Err(unexpected("openAuction", &other)),
        }
    }

    pub async fn place_bid(
        &self,
        auction_id: &str,
        bidder: &str,
        amount: u64,
    ) -> AuctionResult<BidOutcome> {
        match self
            .call(Request::PlaceBid {
                auction_id: auction_id.to_string(),
                bidder: bidder.to_string(),
                amount,
            })
            .await?
        {
            Response::BidPlaced(outcome) => Ok(outcome),
            other => Err(unexpected("placeBid", &other)),
        }
    }

    pub async fn close_auction(&self, auction_id: &str) -> AuctionResult<CloseOutcome> {
        match self
            .call(Request::CloseAuction {
                auction_id: auction_id.to_string(),
            })
            .await?
        {
            Response::AuctionClosed(outcome) => Ok(outcome),
            other => Err(unexpected("closeAuction", &other)),
        }
    }

    pub async fn get_auction_details(&self, auction_id: &str) -> AuctionResult<Auction> {
        match self
            .call(Request::GetAuctionDetails {
                auction_id: auction_id.to_string(),
            })
            .await?
        {
            Response::AuctionDetails(auction) => Ok(*auction),
            other => Err(unexpected("getAuctionDetails", &other)),
        }
    }
}

fn unexpected(method: &str, response: &Response) -> AuctionError {
    AuctionError::InvalidState(format!("unexpected reply to {method}: {response:?}"))
}
