//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Which quantity fell short.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallKind {
    /// `qty_on_hand - qty_allocated` was too small to reserve.
    Available,
    /// Physical stock was too small.
    OnHand,
    /// Reserved stock was too small to ship.
    Allocated,
}

impl core::fmt::Display for ShortfallKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ShortfallKind::Available => "available",
            ShortfallKind::OnHand => "on hand",
            ShortfallKind::Allocated => "allocated",
        })
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// shortfalls, invariants, conflicts). Storage failures belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input, rejected before any quantity is touched.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Not enough stock for the requested quantity; nothing was changed.
    #[error("insufficient {kind} quantity: requested {requested}, available {available}")]
    InsufficientInventory {
        kind: ShortfallKind,
        requested: i64,
        available: i64,
    },

    /// A domain invariant would be violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced SKU, order, ASN or stock record is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The entity is in a terminal state (shipped, cancelled, completed, deleted).
    #[error("already terminal: {0}")]
    AlreadyTerminal(String),

    /// A conflict occurred (duplicate number, stale version, wrong state).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn already_terminal(msg: impl Into<String>) -> Self {
        Self::AlreadyTerminal(msg.into())
    }

    pub fn insufficient(kind: ShortfallKind, requested: i64, available: i64) -> Self {
        Self::InsufficientInventory {
            kind,
            requested,
            available,
        }
    }

    /// Business-rule and input errors the caller can show to an operator.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DomainError::InvariantViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_message_names_the_quantity() {
        let err = DomainError::insufficient(ShortfallKind::Available, 50, 40);
        assert_eq!(
            err.to_string(),
            "insufficient available quantity: requested 50, available 40"
        );
    }

    #[test]
    fn only_invariant_violations_are_unrecoverable() {
        assert!(DomainError::validation("x").is_recoverable());
        assert!(DomainError::already_terminal("x").is_recoverable());
        assert!(!DomainError::invariant("x").is_recoverable());
    }
}
