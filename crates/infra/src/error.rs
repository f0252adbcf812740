//! Engine-level error taxonomy.
//!
//! Domain, storage and authorization failures are folded into one enum so the
//! presentation layer has a single thing to match on.

use thiserror::Error;

use stockforge_auth::AuthzError;
use stockforge_core::{DomainError, ShortfallKind};

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed input, rejected before any ledger access.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient inventory: requested {requested}, {kind} {available}")]
    InsufficientInventory {
        kind: ShortfallKind,
        requested: i64,
        available: i64,
    },

    /// Bug-class failure; the transaction was rolled back.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already terminal: {0}")]
    AlreadyTerminal(String),

    /// Business-rule rejection (wrong status, duplicate number, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Errors the caller can act on (fix input, wait, pick another order).
    pub fn is_recoverable(&self) -> bool {
        !self.is_internal()
    }

    /// Errors that indicate a bug or an infrastructure failure.
    pub fn is_internal(&self) -> bool {
        matches!(self, EngineError::InvariantViolation(_) | EngineError::Store(_))
    }

    /// Message safe to show an end user; internal failures are not detailed.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "internal error; the operation was rolled back".to_string()
        } else {
            self.to_string()
        }
    }

    pub fn insufficient_available(requested: i64, available: i64) -> Self {
        EngineError::InsufficientInventory {
            kind: ShortfallKind::Available,
            requested,
            available,
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                EngineError::Validation(msg)
            }
            DomainError::InsufficientInventory {
                kind,
                requested,
                available,
            } => EngineError::InsufficientInventory {
                kind,
                requested,
                available,
            },
            DomainError::InvariantViolation(msg) => EngineError::InvariantViolation(msg),
            DomainError::NotFound(what) => EngineError::NotFound(what),
            DomainError::AlreadyTerminal(msg) => EngineError::AlreadyTerminal(msg),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
            DomainError::Unauthorized => EngineError::Forbidden("unauthorized".to_string()),
        }
    }
}

impl From<AuthzError> for EngineError {
    fn from(value: AuthzError) -> Self {
        EngineError::Forbidden(value.to_string())
    }
}
