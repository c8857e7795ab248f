use thiserror::Error;

/// Failure taxonomy for the announce pipeline. Every variant carries a
/// human-readable reason; `kind()` gives callers the machine-readable tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Malformed identity/hash/signature shape. Rejected before any side effect.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Signature recovered to an address other than the expected one.
    #[error("signature recovered to {recovered}, expected {expected}")]
    Auth { expected: String, recovered: String },

    /// Unknown peer-session binding, or identity not registered on the ledger.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate receipt, or an identity that is already registered.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Ratio below the configured minimum. A policy decision, not a failure.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Ledger unreachable, timed out, or otherwise misbehaving.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Validation(_) => "validation",
            GateError::Auth { .. } => "auth",
            GateError::NotFound(_) => "not_found",
            GateError::Conflict(_) => "conflict",
            GateError::AccessDenied(_) => "access_denied",
            GateError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
