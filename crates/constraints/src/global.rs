//! Process-wide constraints (currently only the monthly budget).

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constraint::ConstraintParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalConstraintKind {
    MonthlyBudget,
}

impl GlobalConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MonthlyBudget => "monthly_budget",
        }
    }
}

impl core::fmt::Display for GlobalConstraintKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlobalConstraintKind {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly_budget" => Ok(Self::MonthlyBudget),
            other => Err(ConstraintParseError::UnknownKind(other.to_string())),
        }
    }
}

/// A persisted global constraint row. At most one row per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConstraint {
    pub constraint_type: GlobalConstraintKind,
    pub constraint_value: String,
    #[serde(default)]
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Parsed view over the global constraint rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConstraints {
    monthly_budget: Option<Decimal>,
}

impl GlobalConstraints {
    pub fn from_rows(rows: &[GlobalConstraint]) -> Self {
        let mut parsed = Self::default();
        for row in rows {
            match row.constraint_type {
                GlobalConstraintKind::MonthlyBudget => {
                    match Decimal::from_str(row.constraint_value.trim()) {
                        Ok(v) if !v.is_sign_negative() => parsed.monthly_budget = Some(v),
                        _ => tracing::warn!(
                            constraint_type = %row.constraint_type,
                            value = %row.constraint_value,
                            "ignoring unparseable global constraint"
                        ),
                    }
                }
            }
        }
        parsed
    }

    pub fn with_monthly_budget(monthly_budget: Decimal) -> Self {
        Self {
            monthly_budget: Some(monthly_budget),
        }
    }

    pub fn monthly_budget(&self) -> Option<Decimal> {
        self.monthly_budget
    }
}
