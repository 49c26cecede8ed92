//! Constraint evaluation against a proposed order.
//!
//! Checks run in a fixed order: `max_quantity`, `min_quantity`,
//! `budget_limit`, then the remaining monthly budget. The first failure is
//! reported.
//!
//! When the same scalar kind appears more than once, the strictest value
//! governs (smallest max, largest min, smallest budget), which is the same
//! outcome as checking every entry and failing on any.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constraint::{Constraint, StoredConstraint};

/// How the quantity ceiling is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ValidationMode {
    /// `current_stock + quantity` must not exceed `max_quantity`.
    OffsetByStock { current_stock: u64 },
    /// `quantity` alone must not exceed `max_quantity`; used when the
    /// quantity was already netted against stock upstream.
    NoStockOffset,
}

impl ValidationMode {
    fn stock_offset(self) -> u64 {
        match self {
            Self::OffsetByStock { current_stock } => current_stock,
            Self::NoStockOffset => 0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "constraint", rename_all = "snake_case")]
pub enum ConstraintViolation {
    #[error(
        "Quantity {requested} exceeds max limit of {limit} (stock after order would be {projected}); at most {max_orderable} units can be ordered"
    )]
    MaxQuantity {
        requested: u64,
        projected: u64,
        limit: u64,
        max_orderable: u64,
    },

    #[error("Quantity {requested} is below min limit of {limit}")]
    MinQuantity { requested: u64, limit: u64 },

    #[error("Total cost ${total_cost:.2} exceeds budget limit of ${limit:.2}")]
    BudgetLimit { total_cost: Decimal, limit: Decimal },

    #[error("Total cost ${total_cost:.2} exceeds remaining monthly budget of ${remaining:.2}")]
    MonthlyBudget {
        total_cost: Decimal,
        remaining: Decimal,
    },
}

impl ConstraintViolation {
    /// Stable name of the violated constraint, as written to audit entries.
    pub fn constraint_type(&self) -> &'static str {
        match self {
            Self::MaxQuantity { .. } => "max_quantity",
            Self::MinQuantity { .. } => "min_quantity",
            Self::BudgetLimit { .. } => "budget_limit",
            Self::MonthlyBudget { .. } => "monthly_budget",
        }
    }
}

/// The effective policy for one SKU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    blocked_vendors: BTreeSet<String>,
    max_quantity: Option<u64>,
    min_quantity: Option<u64>,
    budget_limit: Option<Decimal>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored rows; unparseable rows are logged and skipped.
    pub fn from_stored(rows: &[StoredConstraint]) -> Self {
        let parsed = rows.iter().filter_map(|row| match row.parse() {
            Ok(c) => Some(c),
            Err(err) => {
                tracing::warn!(
                    sku = %row.sku_id,
                    constraint = %row.id,
                    error = %err,
                    "ignoring unparseable constraint"
                );
                None
            }
        });
        Self::from_constraints(parsed)
    }

    pub fn from_constraints(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        let mut set = Self::default();
        for c in constraints {
            set.push(c);
        }
        set
    }

    pub fn push(&mut self, constraint: Constraint) {
        match constraint {
            Constraint::VendorRestriction(vendor) => {
                self.blocked_vendors.insert(vendor.trim().to_lowercase());
            }
            Constraint::MaxQuantity(v) => {
                self.max_quantity = Some(self.max_quantity.map_or(v, |cur| cur.min(v)));
            }
            Constraint::MinQuantity(v) => {
                self.min_quantity = Some(self.min_quantity.map_or(v, |cur| cur.max(v)));
            }
            Constraint::BudgetLimit(v) => {
                self.budget_limit = Some(self.budget_limit.map_or(v, |cur| cur.min(v)));
            }
        }
    }

    /// Lower-cased names of blocked vendors.
    pub fn blocked_vendors(&self) -> &BTreeSet<String> {
        &self.blocked_vendors
    }

    pub fn is_blocked(&self, vendor: &str) -> bool {
        self.blocked_vendors.contains(&vendor.trim().to_lowercase())
    }

    pub fn max_quantity(&self) -> Option<u64> {
        self.max_quantity
    }

    pub fn min_quantity(&self) -> Option<u64> {
        self.min_quantity
    }

    pub fn budget_limit(&self) -> Option<Decimal> {
        self.budget_limit
    }

    /// Largest quantity that passes the max check, if a max is set.
    pub fn max_orderable(&self, mode: ValidationMode) -> Option<u64> {
        self.max_quantity
            .map(|limit| limit.saturating_sub(mode.stock_offset()))
    }

    /// The quantity checks (`max_quantity`, then `min_quantity`).
    pub fn validate_quantity(
        &self,
        quantity: u64,
        mode: ValidationMode,
    ) -> Result<(), ConstraintViolation> {
        if let Some(limit) = self.max_quantity {
            let projected = mode.stock_offset().saturating_add(quantity);
            if projected > limit {
                return Err(ConstraintViolation::MaxQuantity {
                    requested: quantity,
                    projected,
                    limit,
                    max_orderable: limit.saturating_sub(mode.stock_offset()),
                });
            }
        }
        if let Some(limit) = self.min_quantity {
            if quantity < limit {
                return Err(ConstraintViolation::MinQuantity {
                    requested: quantity,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// The per-order cost check and, when a monthly cap is active, the
    /// remaining-budget check.
    pub fn validate_cost(
        &self,
        total_cost: Decimal,
        remaining_budget: Option<Decimal>,
    ) -> Result<(), ConstraintViolation> {
        if let Some(limit) = self.budget_limit {
            if total_cost > limit {
                return Err(ConstraintViolation::BudgetLimit { total_cost, limit });
            }
        }
        if let Some(remaining) = remaining_budget {
            if total_cost > remaining {
                return Err(ConstraintViolation::MonthlyBudget {
                    total_cost,
                    remaining,
                });
            }
        }
        Ok(())
    }

    /// Full check. The cost checks run only when a cost is supplied.
    pub fn validate(
        &self,
        quantity: u64,
        total_cost: Option<Decimal>,
        remaining_budget: Option<Decimal>,
        mode: ValidationMode,
    ) -> Result<(), ConstraintViolation> {
        self.validate_quantity(quantity, mode)?;
        match total_cost {
            Some(cost) => self.validate_cost(cost, remaining_budget),
            None => Ok(()),
        }
    }
}
