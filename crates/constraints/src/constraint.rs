use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use restock_core::{ConstraintId, SkuId};

/// The four per-SKU constraint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    VendorRestriction,
    BudgetLimit,
    MaxQuantity,
    MinQuantity,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 4] = [
        ConstraintKind::VendorRestriction,
        ConstraintKind::BudgetLimit,
        ConstraintKind::MaxQuantity,
        ConstraintKind::MinQuantity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VendorRestriction => "vendor_restriction",
            Self::BudgetLimit => "budget_limit",
            Self::MaxQuantity => "max_quantity",
            Self::MinQuantity => "min_quantity",
        }
    }
}

impl core::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintKind {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vendor_restriction" => Ok(Self::VendorRestriction),
            "budget_limit" => Ok(Self::BudgetLimit),
            "max_quantity" => Ok(Self::MaxQuantity),
            "min_quantity" => Ok(Self::MinQuantity),
            other => Err(ConstraintParseError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintParseError {
    #[error("unknown constraint type '{0}'")]
    UnknownKind(String),

    #[error("{kind} value '{value}' is not numeric")]
    NotNumeric { kind: ConstraintKind, value: String },

    #[error("{kind} value '{value}' must not be negative")]
    Negative { kind: ConstraintKind, value: String },

    #[error("vendor_restriction value is empty")]
    EmptyVendor,
}

/// A constraint row as persisted: the value is always a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConstraint {
    pub id: ConstraintId,
    pub sku_id: SkuId,
    pub constraint_type: String,
    pub constraint_value: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredConstraint {
    pub fn parse(&self) -> Result<Constraint, ConstraintParseError> {
        let kind = self.constraint_type.parse::<ConstraintKind>()?;
        Constraint::parse(kind, &self.constraint_value)
    }
}

/// A parsed per-SKU constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "constraint_type", content = "value", rename_all = "snake_case")]
pub enum Constraint {
    /// Ceiling on stock after the order lands (on-hand + ordered).
    MaxQuantity(u64),
    /// Floor on the ordered quantity.
    MinQuantity(u64),
    /// Ceiling on a single order's total cost.
    BudgetLimit(Decimal),
    /// A vendor that must not be ordered from.
    VendorRestriction(String),
}

impl Constraint {
    /// Parse a stored value for the given kind.
    ///
    /// Quantities accept integral decimal forms such as `"50.0"` and are
    /// truncated toward zero.
    pub fn parse(kind: ConstraintKind, raw: &str) -> Result<Self, ConstraintParseError> {
        let value = raw.trim();
        match kind {
            ConstraintKind::VendorRestriction => {
                if value.is_empty() {
                    return Err(ConstraintParseError::EmptyVendor);
                }
                Ok(Self::VendorRestriction(value.to_string()))
            }
            ConstraintKind::BudgetLimit => Ok(Self::BudgetLimit(parse_amount(kind, value)?)),
            ConstraintKind::MaxQuantity => Ok(Self::MaxQuantity(parse_units(kind, value)?)),
            ConstraintKind::MinQuantity => Ok(Self::MinQuantity(parse_units(kind, value)?)),
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::MaxQuantity(_) => ConstraintKind::MaxQuantity,
            Self::MinQuantity(_) => ConstraintKind::MinQuantity,
            Self::BudgetLimit(_) => ConstraintKind::BudgetLimit,
            Self::VendorRestriction(_) => ConstraintKind::VendorRestriction,
        }
    }

    /// The value in its stored string form.
    pub fn value_string(&self) -> String {
        match self {
            Self::MaxQuantity(v) | Self::MinQuantity(v) => v.to_string(),
            Self::BudgetLimit(v) => v.normalize().to_string(),
            Self::VendorRestriction(v) => v.clone(),
        }
    }
}

fn parse_amount(kind: ConstraintKind, value: &str) -> Result<Decimal, ConstraintParseError> {
    let amount = Decimal::from_str(value).map_err(|_| ConstraintParseError::NotNumeric {
        kind,
        value: value.to_string(),
    })?;
    if amount.is_sign_negative() {
        return Err(ConstraintParseError::Negative {
            kind,
            value: value.to_string(),
        });
    }
    Ok(amount)
}

fn parse_units(kind: ConstraintKind, value: &str) -> Result<u64, ConstraintParseError> {
    parse_amount(kind, value)?
        .trunc()
        .to_u64()
        .ok_or_else(|| ConstraintParseError::NotNumeric {
            kind,
            value: value.to_string(),
        })
}
