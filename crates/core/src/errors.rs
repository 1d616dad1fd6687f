//! Error types

use thiserror::Error;

/// Bridge error types
///
/// `ModuleUnavailable` is the only failure that crosses the RPC boundary.
/// Invalid parameters and empty native results are not errors: the bridge
/// answers them with the response type's empty/default value, because the
/// terminal treats them as "no data" conditions rather than faults.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("native trading module unavailable: {0}")]
    ModuleUnavailable(String),

    #[error("invalid order request payload: {0}")]
    InvalidOrderRequest(String),
}

/// Result type alias
pub type BridgeResult<T> = Result<T, BridgeError>;
