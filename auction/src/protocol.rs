//! Request, response and event schema exchanged between coordinator and peers.
//!
//! Every frame on the wire is a bincode-encoded [`WireMessage`]. Requests
//! carry one variant per coordinator method; events carry one variant per
//! fan-out notification. Frames are size-limited on decode.

use serde::{Deserialize, Serialize};

use crate::error::{AuctionError, AuctionResult};
use crate::marketplace::{Auction, AuctionId, AuctionType, Bid, CloseResult, HighestBid};
use crate::traits::PeerId;
use crate::util::{from_wire, to_wire};

/// Methods a peer may invoke on a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    RegisterClient {
        peer_id: PeerId,
    },
    OpenAuction {
        item: String,
        price: u64,
        /// `"english"` or `"dutch"`, validated by the handler
        auction_type: String,
        decrement_rate: Option<u64>,
        minimum_price: Option<u64>,
    },
    PlaceBid {
        auction_id: AuctionId,
        bidder: String,
        amount: u64,
    },
    CloseAuction {
        auction_id: AuctionId,
    },
    GetAuctionDetails {
        auction_id: AuctionId,
    },
}

impl Request {
    /// Method name, as used in logs.
    pub const fn method(&self) -> &'static str {
        match self {
            Self::RegisterClient { .. } => "registerClient",
            Self::OpenAuction { .. } => "openAuction",
            Self::PlaceBid { .. } => "placeBid",
            Self::CloseAuction { .. } => "closeAuction",
            Self::GetAuctionDetails { .. } => "getAuctionDetails",
        }
    }
}

/// Outcome of an accepted `placeBid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidOutcome {
    pub success: bool,
    pub current_price: u64,
    pub closed: bool,
}

/// Outcome of `closeAuction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseOutcome {
    pub result: CloseResult,
    /// Set when the auction was already closed and the stored result was
    /// returned unchanged.
    pub already_closed: bool,
}

/// Error category carried in an [`ErrorReply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    AlreadyClosed,
    InvalidParameter,
    BidTooLow,
    PersistenceFailure,
    Internal,
}

/// Structured failure returned to the caller of a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReply {
    pub kind: ErrorKind,
    pub message: String,
    /// `BidTooLow` only: the amount the caller has to meet
    pub threshold: Option<u64>,
    /// `BidTooLow` only: whether the threshold must be strictly exceeded
    pub strictly_greater: bool,
}

impl From<&AuctionError> for ErrorReply {
    fn from(err: &AuctionError) -> Self {
        let (kind, threshold, strictly_greater) = match err {
            AuctionError::NotFound(_) => (ErrorKind::NotFound, None, false),
            AuctionError::AlreadyClosed(_) => (ErrorKind::AlreadyClosed, None, false),
            AuctionError::InvalidParameter(_) => (ErrorKind::InvalidParameter, None, false),
            AuctionError::BidTooLow {
                threshold,
                strictly_greater,
            } => (ErrorKind::BidTooLow, Some(*threshold), *strictly_greater),
            AuctionError::Persistence(_) | AuctionError::Serialization(_) => {
                (ErrorKind::PersistenceFailure, None, false)
            }
            _ => (ErrorKind::Internal, None, false),
        };
        Self {
            kind,
            message: err.to_string(),
            threshold,
            strictly_greater,
        }
    }
}

impl ErrorReply {
    /// Rebuild the caller-side error.
    pub fn into_error(self) -> AuctionError {
        match self.kind {
            ErrorKind::NotFound => AuctionError::NotFound(self.message),
            ErrorKind::AlreadyClosed => AuctionError::AlreadyClosed(self.message),
            ErrorKind::InvalidParameter => AuctionError::InvalidParameter(self.message),
            ErrorKind::BidTooLow => AuctionError::BidTooLow {
                threshold: self.threshold.unwrap_or_default(),
                strictly_greater: self.strictly_greater,
            },
            ErrorKind::PersistenceFailure => AuctionError::Persistence(self.message),
            ErrorKind::Internal => AuctionError::InvalidState(self.message),
        }
    }
}

/// Coordinator reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Registered { success: bool },
    AuctionOpened { auction_id: AuctionId },
    BidPlaced(BidOutcome),
    AuctionClosed(CloseOutcome),
    AuctionDetails(Box<Auction>),
    Error(ErrorReply),
}

impl Response {
    pub fn from_error(err: &AuctionError) -> Self {
        Self::Error(ErrorReply::from(err))
    }
}

/// Notifications pushed to every registered peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    NewAuction {
        auction_id: AuctionId,
        auction: Box<Auction>,
    },
    NewBid {
        auction_id: AuctionId,
        bid: Bid,
        auction_type: AuctionType,
        closed: bool,
        current_price: u64,
    },
    PriceUpdate {
        auction_id: AuctionId,
        current_price: u64,
    },
    AuctionClosed {
        auction_id: AuctionId,
        auction_type: AuctionType,
        highest_bid: Option<HighestBid>,
        winning_bid: Option<Bid>,
        final_price: Option<u64>,
        reason: Option<String>,
    },
}

impl Event {
    /// Event type name, as used in logs.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::NewAuction { .. } => "newAuction",
            Self::NewBid { .. } => "newBid",
            Self::PriceUpdate { .. } => "priceUpdate",
            Self::AuctionClosed { .. } => "auctionClosed",
        }
    }

    pub fn auction_id(&self) -> &str {
        match self {
            Self::NewAuction { auction_id, .. }
            | Self::NewBid { auction_id, .. }
            | Self::PriceUpdate { auction_id, .. }
            | Self::AuctionClosed { auction_id, .. } => auction_id,
        }
    }

    /// `auctionClosed` built from a terminal auction record.
    pub fn closed_from(auction: &Auction) -> Self {
        Self::AuctionClosed {
            auction_id: auction.auction_id.clone(),
            auction_type: auction.auction_type,
            highest_bid: auction.highest_bid.clone(),
            winning_bid: auction.winning_bid.clone(),
            final_price: auction.final_price,
            reason: auction.close_reason.map(|r| r.to_string()),
        }
    }
}

/// Top-level frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    Request(Request),
    Response(Response),
    Event(Event),
    EventAck,
}

impl WireMessage {
    pub fn to_bytes(&self) -> AuctionResult<Vec<u8>> {
        to_wire(self)
    }

    pub fn from_bytes(data: &[u8]) -> AuctionResult<Self> {
        from_wire(data)
    }

    /// Decode a reply that must be a [`Response`].
    pub fn expect_response(data: &[u8]) -> AuctionResult<Response> {
        match Self::from_bytes(data)? {
            Self::Response(response) => Ok(response),
            other => Err(AuctionError::InvalidState(format!(
                "expected a response frame, got {other:?}"
            ))),
        }
    }
}
