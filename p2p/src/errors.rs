use libbeacon::AsyncError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use thiserror::Error;

/// Result codes of an RPC error response chunk, as sent on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcErrorCode {
    InvalidRequest = 1,
    ServerError = 2,
    ResourceUnavailable = 3,
}

impl RpcErrorCode {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An expected, protocol-level RPC error. The remote peer receives the code and message.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct RpcException {
    pub code: RpcErrorCode,
    pub message: String,
}

impl RpcException {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidRequest, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ServerError, message)
    }

    pub fn resource_unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ResourceUnavailable, message)
    }
}

/// How an RPC exchange failed.
#[derive(Clone, Debug, Error)]
pub enum RpcFailure {
    #[error("Error response. {0}")]
    ErrorResponse(RpcException),
    #[error("Unexpected error. {0}")]
    Unexpected(AsyncError),
}

/// Internal faults are not described to the remote peer. They only learn that the server failed.
impl From<&RpcFailure> for RpcException {
    fn from(failure: &RpcFailure) -> Self {
        match failure {
            RpcFailure::ErrorResponse(exception) => exception.clone(),
            RpcFailure::Unexpected(_) => RpcException::server_error("Unexpected error"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeerSelectionError {
    #[error("A composite peer selection strategy needs at least one child strategy")]
    NoStrategies,
    #[error("No sampling query is registered for epoch {epoch}, subnet {subnet}")]
    UnknownQuery { epoch: u64, subnet: u64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error reading/writing configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error de/encoding configuration: {0}")]
    Serde(#[from] serde_yml::Error),
}

/// Best-effort description of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
