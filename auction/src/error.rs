/// Error taxonomy for the auction coordination engine.
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Auction {0} is already closed")]
    AlreadyClosed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The bid did not clear the current threshold. For English auctions
    /// (`strictly_greater`) this is the current highest bid or the start
    /// price; for Dutch auctions it is the live decayed price.
    #[error("Bid too low: threshold is {threshold}")]
    BidTooLow { threshold: u64, strictly_greater: bool },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Registration failed after {attempts} attempts: {last_error}")]
    RegistrationExhausted { attempts: u32, last_error: String },

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Network operation failed: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<veilid_core::VeilidAPIError> for AuctionError {
    fn from(e: veilid_core::VeilidAPIError) -> Self {
        Self::Network(e.to_string())
    }
}

/// Convenience type alias.
pub type AuctionResult<T> = Result<T, AuctionError>;
