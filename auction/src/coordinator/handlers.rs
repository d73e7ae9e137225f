//! Request dispatch for each `Request` variant.
//!
//! Every failure is turned into a [`Response::Error`] here; nothing past
//! this boundary sees an `AuctionError`.

use tracing::{debug, warn};

use super::AuctionCoordinator;
use crate::error::{AuctionError, AuctionResult};
use crate::protocol::{Request, Response, WireMessage};
use crate::traits::{KvStore, MessageTransport, RandomSource, TimeProvider};

impl<S, T, C, R> AuctionCoordinator<S, T, C, R>
where
    S: KvStore,
    T: MessageTransport,
    C: TimeProvider,
    R: RandomSource,
{
    /// Handle one decoded request.
    pub async fn handle_request(&self, request: Request) -> Response {
        let method = request.method();
        debug!("Handling {method}");
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    AuctionError::Persistence(_) | AuctionError::Serialization(_) => {
                        warn!("{method} failed: {e}");
                    }
                    _ => debug!("{method} rejected: {e}"),
                }
                Response::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> AuctionResult<Response> {
        match request {
            Request::RegisterClient { peer_id } => {
                if peer_id.trim().is_empty() {
                    return Err(AuctionError::InvalidParameter(
                        "peerId must not be empty".into(),
                    ));
                }
                self.directory.register_client(&peer_id).await?;
                Ok(Response::Registered { success: true })
            }
            Request::OpenAuction {
                item,
                price,
                auction_type,
                decrement_rate,
                minimum_price,
            } => {
                let auction_id = self
                    .logic
                    .open_auction(&item, price, &auction_type, decrement_rate, minimum_price)
                    .await?;
                Ok(Response::AuctionOpened { auction_id })
            }
            Request::PlaceBid {
                auction_id,
                bidder,
                amount,
            } => {
                let outcome = self.logic.place_bid(&auction_id, &bidder, amount).await?;
                Ok(Response::BidPlaced(outcome))
            }
            Request::CloseAuction { auction_id } => {
                let outcome = self.logic.close_auction(&auction_id).await?;
                Ok(Response::AuctionClosed(outcome))
            }
            Request::GetAuctionDetails { auction_id } => {
                let auction = self.logic.get_auction_details(&auction_id).await?;
                Ok(Response::AuctionDetails(Box::new(auction)))
            }
        }
    }

    /// Process an incoming call (request/response pattern).
    ///
    /// Malformed frames and non-request frames get an error reply; only a
    /// failure to encode the reply itself is returned as `Err`.
    pub async fn process_call(&self, data: &[u8]) -> AuctionResult<Vec<u8>> {
        let response = match WireMessage::from_bytes(data) {
            Ok(WireMessage::Request(request)) => self.handle_request(request).await,
            Ok(other) => {
                warn!("Coordinator received a non-request frame: {other:?}");
                Response::from_error(&AuctionError::InvalidParameter(
                    "expected a request frame".into(),
                ))
            }
            Err(e) => {
                warn!("Rejecting malformed call ({} bytes): {e}", data.len());
                Response::from_error(&e)
            }
        };
        WireMessage::Response(response).to_bytes()
    }
}
