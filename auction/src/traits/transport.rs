//! Request/response transport abstraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AuctionResult;

/// Opaque transport address of a peer.
///
/// Over Veilid this is the hex encoding of the peer's private route blob;
/// the engine never looks inside it.
pub type PeerId = String;

/// Abstraction over the messaging transport.
///
/// Payloads are opaque bytes; the method being invoked travels inside the
/// encoded frame (see [`crate::protocol::WireMessage`]).
#[async_trait]
pub trait MessageTransport: Send + Sync + Clone + 'static {
    /// Send `payload` to `peer` and wait for its reply.
    ///
    /// Fails with [`crate::AuctionError::Transport`] if the peer is
    /// unreachable or does not answer within `timeout`.
    async fn request(
        &self,
        peer: &PeerId,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> AuctionResult<Vec<u8>>;
}
