//! Persistent key-value store abstraction.

use async_trait::async_trait;

use crate::error::AuctionResult;

/// Durable key-to-value mapping shared by every component of a coordinator.
///
/// Implementations must give read-your-writes consistency within one
/// process. No transaction API is assumed: read-modify-write sequences are
/// serialized by the caller.
#[async_trait]
pub trait KvStore: Send + Sync + Clone + 'static {
    /// Read the value stored under `key`, or `None` if it was never written.
    async fn get(&self, key: &str) -> AuctionResult<Option<Vec<u8>>>;

    /// Overwrite the value stored under `key`.
    async fn put(&self, key: &str, value: Vec<u8>) -> AuctionResult<()>;
}
