use thiserror::Error;

use crate::requests::{ActionKind, CartError, IdentityError, RequestId, Role, Stage, StoreError};

/// Typed failures surfaced to workflow callers
///
/// None of these are fatal: a rejected action leaves the stored record as
/// it was, and the caller decides how to present the failure.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("request {0} not found")]
    NotFound(RequestId),

    #[error("cannot {action} a request that is {from}")]
    InvalidTransition { from: Stage, action: ActionKind },

    #[error("{role} may not {operation}")]
    Unauthorized { role: Role, operation: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("request {id} kept changing underneath us after {attempts} attempts")]
    Conflict { id: RequestId, attempts: u32 },

    #[error("cart hand-off failed: {0}")]
    Cart(#[from] CartError),

    #[error("identity lookup failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("request store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WorkflowError::NotFound(id),
            other => WorkflowError::Store(other),
        }
    }
}

impl WorkflowError {
    /// Stable machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::Unauthorized { .. } => "unauthorized",
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::Cart(_) => "cart",
            WorkflowError::Identity(_) => "identity",
            WorkflowError::Store(_) => "store",
        }
    }

    pub(crate) fn unauthorized(role: Role, operation: impl Into<String>) -> Self {
        WorkflowError::Unauthorized {
            role,
            operation: operation.into(),
        }
    }
}
