use serde::{Deserialize, Serialize};
use thiserror::Error;

use restock_ai::PredictorError;
use restock_constraints::ConstraintViolation;
use restock_core::DomainError;

/// Persistence failure.
///
/// "Not found" is not an error at this level: lookups return `Option`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Optimistic concurrency failure (stale version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Stored data violates a structural rule (e.g. duplicate key, dangling reference).
    #[error("integrity error: {0}")]
    Integrity(String),

    /// The backing store could not serve the request.
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Which external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    Repository,
    Predictor,
}

impl core::fmt::Display for Upstream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Repository => f.write_str("repository"),
            Self::Predictor => f.write_str("predictor"),
        }
    }
}

/// Error surface of the procurement workflows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcurementError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintViolation),

    #[error("no vendors available (blocked: {})", vendor_list(.blocked))]
    NoVendorsAvailable { blocked: Vec<String> },

    #[error("preferred vendor '{vendor}' is blocked (available: {})", vendor_list(.available))]
    PreferredVendorBlocked {
        vendor: String,
        available: Vec<String>,
    },

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("leg {leg} is already delivered")]
    AlreadyDelivered { leg: usize },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{upstream} unavailable: {reason}")]
    UpstreamUnavailable { upstream: Upstream, reason: String },

    /// Lost an optimistic concurrency race (after retries, if any).
    #[error("conflict: {0}")]
    Conflict(String),
}

fn vendor_list(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

impl ProcurementError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<DomainError> for ProcurementError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => Self::InvalidInput(msg),
            DomainError::InvalidId(msg) => Self::InvalidInput(msg),
            DomainError::InvariantViolation(msg) => Self::InvalidState(msg),
            DomainError::NotFound(what) => Self::NotFound(what),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::InsufficientStock {
                requested,
                available,
            } => Self::InsufficientStock {
                requested,
                available,
            },
            DomainError::NoVendorsAvailable { blocked } => Self::NoVendorsAvailable { blocked },
            DomainError::PreferredVendorBlocked { vendor, available } => {
                Self::PreferredVendorBlocked { vendor, available }
            }
            DomainError::AlreadyDelivered { leg } => Self::AlreadyDelivered { leg },
        }
    }
}

impl From<RepositoryError> for ProcurementError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Concurrency(msg) => Self::Conflict(msg),
            RepositoryError::Integrity(msg) => Self::InvalidInput(msg),
            RepositoryError::Unavailable(reason) => Self::UpstreamUnavailable {
                upstream: Upstream::Repository,
                reason,
            },
        }
    }
}

impl From<PredictorError> for ProcurementError {
    fn from(value: PredictorError) -> Self {
        match value {
            PredictorError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::UpstreamUnavailable {
                upstream: Upstream::Predictor,
                reason: other.to_string(),
            },
        }
    }
}
