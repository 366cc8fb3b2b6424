use thiserror::Error;

use super::types::RequestId;

/// Errors raised by a request store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request {0} not found")]
    NotFound(RequestId),

    #[error("request {0} already exists")]
    Duplicate(RequestId),

    #[error("request {id} changed concurrently: expected version {expected}, found {found}")]
    VersionConflict {
        id: RequestId,
        expected: u64,
        found: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored state is corrupt: {reason}")]
    Corrupt { reason: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by the cart collaborator
#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart rejected line item: {0}")]
    Rejected(String),

    #[error("cart unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while resolving the acting user
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no acting user given; pass --as or set SHOP_WORKFLOW_USER")]
    Anonymous,

    #[error("unknown user '{0}'")]
    UnknownUser(String),
}
