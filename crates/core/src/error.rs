//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Deterministic business failures only (validation, invariants, stock and
/// vendor rules). Storage and predictor failures live in their own crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (malformed or inconsistent input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The named resource (SKU, transaction, leg) does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient stock: have {available}, requested {requested}")]
    InsufficientStock { requested: u64, available: u64 },

    /// Every candidate vendor is blocked (or there were none to begin with).
    #[error("no vendors available (blocked: {})", .blocked.join(", "))]
    NoVendorsAvailable { blocked: Vec<String> },

    #[error("preferred vendor '{vendor}' is blocked (available: {})", .available.join(", "))]
    PreferredVendorBlocked {
        vendor: String,
        available: Vec<String>,
    },

    #[error("leg {leg} already delivered")]
    AlreadyDelivered { leg: usize },
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
}
