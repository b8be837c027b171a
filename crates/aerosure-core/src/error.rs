use crate::types::Money;
use thiserror::Error;

/// Aerosure core errors.
///
/// Every rejected precondition aborts the whole call; callers own any retry
/// policy. `Internal` marks invariant breaches that indicate a bug rather
/// than an expected caller outcome.
#[derive(Debug, Error)]
pub enum AerosureError {
    #[error("operations are currently suspended")]
    Unavailable,

    #[error("caller is not permitted to {0}")]
    Forbidden(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient funds: required {required}, provided {provided}")]
    InsufficientFunds { required: Money, provided: Money },

    #[error("value {provided} exceeds limit {limit}")]
    ExceedsLimit { limit: Money, provided: Money },

    #[error("duplicate vote from the same principal")]
    DuplicateVote,

    #[error("stale or unknown status request: {0}")]
    StaleOrUnknownRequest(String),

    #[error("value transfer failed: {0}")]
    Transfer(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type AerosureResult<T> = Result<T, AerosureError>;
