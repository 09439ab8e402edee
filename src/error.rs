//! Crate-wide error types.
//!
//! `BlockchainError` is the RPC-transport-level error the teacher crate
//! shipped; `FabricError` wraps it and adds the error kinds named in the
//! spec's error-handling design (transient upstream, rate limiting,
//! malformed payloads, cache unavailability, lease loss, bad user input).

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BlockchainError {
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("rate limited")]
    RateLimited,
    #[error("data is inconsistent: {0}")]
    DataInconsistency(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Stable error kind tag surfaced to API clients. Never carries a stack
/// trace or internal detail beyond a short message.
#[derive(Error, Debug, Clone)]
pub enum FabricError {
    #[error("transient upstream failure: {0}")]
    Transient(String),
    #[error("rate limited by upstream")]
    RateLimited,
    #[error("malformed upstream payload: {0}")]
    Malformed(String),
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("lease lost")]
    LeaseLost,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl FabricError {
    /// The stable tag returned in `{status:"error", error:"<kind>"}` envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            FabricError::Transient(_) => "transient_upstream",
            FabricError::RateLimited => "rate_limited",
            FabricError::Malformed(_) => "malformed_upstream",
            FabricError::CacheUnavailable(_) => "cache_unavailable",
            FabricError::LeaseLost => "lease_lost",
            FabricError::InvalidInput(_) => "invalid_input",
            FabricError::Internal(_) => "internal",
        }
    }
}

impl From<BlockchainError> for FabricError {
    fn from(e: BlockchainError) -> Self {
        match e {
            BlockchainError::NetworkFailure(m) => FabricError::Transient(m),
            BlockchainError::RateLimited => FabricError::RateLimited,
            BlockchainError::NotFound(m) => FabricError::InvalidInput(m),
            BlockchainError::InvalidInput(m) => FabricError::InvalidInput(m),
            BlockchainError::DataInconsistency(m) => FabricError::Malformed(m),
            BlockchainError::Other(m) => FabricError::Internal(m),
        }
    }
}

impl From<redis::RedisError> for FabricError {
    fn from(e: redis::RedisError) -> Self {
        FabricError::CacheUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for FabricError {
    fn from(e: serde_json::Error) -> Self {
        FabricError::Malformed(e.to_string())
    }
}

pub type FabricResult<T> = std::result::Result<T, FabricError>;
