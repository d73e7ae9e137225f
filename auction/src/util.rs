//! Encoding helpers shared across the crate.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{MAX_STORED_VALUE_SIZE, MAX_WIRE_MESSAGE_SIZE};
use crate::error::{AuctionError, AuctionResult};

/// Serialize a value to CBOR for the persistent store.
pub fn to_cbor<T: Serialize>(value: &T) -> AuctionResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| AuctionError::Serialization(format!("CBOR serialization failed: {e}")))?;
    Ok(buf)
}

/// Deserialize a stored CBOR value, refusing oversized payloads.
pub fn from_cbor<T: DeserializeOwned>(data: &[u8]) -> AuctionResult<T> {
    if data.len() > MAX_STORED_VALUE_SIZE {
        return Err(AuctionError::Serialization(format!(
            "CBOR payload too large: {} bytes (max {})",
            data.len(),
            MAX_STORED_VALUE_SIZE
        )));
    }
    ciborium::from_reader(data)
        .map_err(|e| AuctionError::Serialization(format!("CBOR deserialization failed: {e}")))
}

fn wire_options() -> impl Options {
    bincode::options().with_limit(MAX_WIRE_MESSAGE_SIZE)
}

/// Encode a wire frame with bincode.
pub fn to_wire<T: Serialize>(value: &T) -> AuctionResult<Vec<u8>> {
    wire_options()
        .serialize(value)
        .map_err(|e| AuctionError::Serialization(format!("Failed to encode wire frame: {e}")))
}

/// Decode a wire frame, rejecting malformed or oversized input.
pub fn from_wire<T: DeserializeOwned>(data: &[u8]) -> AuctionResult<T> {
    wire_options()
        .deserialize(data)
        .map_err(|e| AuctionError::InvalidParameter(format!("Malformed wire frame: {e}")))
}
