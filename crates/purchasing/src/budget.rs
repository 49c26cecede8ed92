//! Monthly spend and remaining global budget.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::transaction::{PurchaseTransaction, TransactionStatus};

/// Which transactions count toward monthly spend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendPolicy {
    /// Every transaction created in the month, cancelled ones included.
    #[default]
    IncludeCancelled,
    ExcludeCancelled,
}

impl SpendPolicy {
    fn counts(self, status: TransactionStatus) -> bool {
        match self {
            Self::IncludeCancelled => true,
            Self::ExcludeCancelled => status != TransactionStatus::Cancelled,
        }
    }
}

impl core::str::FromStr for SpendPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "include_cancelled" => Ok(Self::IncludeCancelled),
            "exclude_cancelled" => Ok(Self::ExcludeCancelled),
            other => Err(format!("unknown spend policy '{other}'")),
        }
    }
}

/// Half-open calendar month `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthRange {
    /// The calendar month containing `at`.
    pub fn containing(at: DateTime<Utc>) -> Self {
        let first = NaiveDate::from_ymd_opt(at.year(), at.month(), 1).unwrap_or(at.date_naive());
        let next = first.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX);
        Self {
            start: Utc.from_utc_datetime(&first.and_time(NaiveTime::default())),
            end: Utc.from_utc_datetime(&next.and_time(NaiveTime::default())),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Spend accounting against the optional `monthly_budget`.
///
/// A batch pass keeps one tracker and records each placed order, so later
/// SKUs in the same pass see the reduced remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetTracker {
    monthly_budget: Option<Decimal>,
    spent: Decimal,
}

impl BudgetTracker {
    pub fn new(monthly_budget: Option<Decimal>, spent: Decimal) -> Self {
        Self {
            monthly_budget,
            spent,
        }
    }

    /// Build from the month's transactions.
    pub fn from_transactions<'a>(
        monthly_budget: Option<Decimal>,
        transactions: impl IntoIterator<Item = &'a PurchaseTransaction>,
        range: MonthRange,
        policy: SpendPolicy,
    ) -> Self {
        let spent = transactions
            .into_iter()
            .filter(|tx| range.contains(tx.created_at()) && policy.counts(tx.status()))
            .map(PurchaseTransaction::total_cost)
            .sum();
        Self::new(monthly_budget, spent)
    }

    pub fn monthly_spent(&self) -> Decimal {
        self.spent
    }

    pub fn monthly_budget(&self) -> Option<Decimal> {
        self.monthly_budget
    }

    /// `max(0, budget - spent)`, or `None` when no budget is set.
    pub fn remaining(&self) -> Option<Decimal> {
        self.monthly_budget
            .map(|budget| (budget - self.spent).max(Decimal::ZERO))
    }

    pub fn record_spend(&mut self, cost: Decimal) {
        self.spent += cost;
    }
}
