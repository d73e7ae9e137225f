pub mod auction;
pub mod bid;

pub use auction::{
    decayed_price, Auction, AuctionId, AuctionTerms, AuctionType, CloseReason, CloseResult,
    DutchTerms,
};
pub use bid::{Bid, HighestBid};
