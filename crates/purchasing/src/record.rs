//! Persisted transaction row.
//!
//! The legs are stored column-wise as five parallel arrays (`vendors`,
//! `quantities`, `costs`, `delivery_times`, `vendor_statuses`) of equal length.
//! Rows written before per-leg tracking existed may carry empty
//! `vendor_statuses` (all legs pending) or empty `delivery_times` (no
//! delivery data).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use restock_core::{AggregateRoot, DomainError, SkuId, TransactionId};

use crate::transaction::{
    LegStatus, PurchaseTransaction, TransactionStatus, VendorLeg, derive_status,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub sku_id: SkuId,
    pub sku_name: String,
    pub total_quantity: u64,
    pub vendors: Vec<String>,
    pub quantities: Vec<u64>,
    pub costs: Vec<Decimal>,
    #[serde(default)]
    pub delivery_times: Vec<u32>,
    #[serde(default)]
    pub vendor_statuses: Vec<LegStatus>,
    pub total_cost: Decimal,
    pub status: TransactionStatus,
    pub expected_delivery_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl From<&PurchaseTransaction> for TransactionRecord {
    fn from(tx: &PurchaseTransaction) -> Self {
        let legs = tx.legs();
        Self {
            id: tx.id_typed(),
            sku_id: tx.sku_id(),
            sku_name: tx.sku_name().to_string(),
            total_quantity: tx.total_quantity(),
            vendors: legs.iter().map(|l| l.vendor.clone()).collect(),
            quantities: legs.iter().map(|l| l.quantity).collect(),
            costs: legs.iter().map(|l| l.unit_cost).collect(),
            delivery_times: legs.iter().filter_map(|l| l.delivery_days).collect(),
            vendor_statuses: legs.iter().map(|l| l.status).collect(),
            total_cost: tx.total_cost(),
            status: tx.status(),
            expected_delivery_date: tx.expected_delivery_date(),
            created_at: tx.created_at(),
            version: tx.version(),
        }
    }
}

impl TryFrom<TransactionRecord> for PurchaseTransaction {
    type Error = DomainError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let n = record.vendors.len();
        if n == 0 {
            return Err(DomainError::validation(format!(
                "transaction {}: no vendor legs",
                record.id
            )));
        }
        check_len(record.id, "quantities", record.quantities.len(), n, false)?;
        check_len(record.id, "costs", record.costs.len(), n, false)?;
        check_len(record.id, "delivery_times", record.delivery_times.len(), n, true)?;
        check_len(record.id, "vendor_statuses", record.vendor_statuses.len(), n, true)?;

        let legs: Vec<VendorLeg> = (0..n)
            .map(|i| VendorLeg {
                vendor: record.vendors[i].clone(),
                quantity: record.quantities[i],
                unit_cost: record.costs[i],
                delivery_days: record.delivery_times.get(i).copied(),
                status: record
                    .vendor_statuses
                    .get(i)
                    .copied()
                    .unwrap_or(LegStatus::Pending),
            })
            .collect();

        let total_quantity: u64 = legs.iter().map(|l| l.quantity).sum();
        if total_quantity != record.total_quantity {
            return Err(DomainError::validation(format!(
                "transaction {}: total_quantity {} does not match legs ({total_quantity})",
                record.id, record.total_quantity
            )));
        }
        let total_cost: Decimal = legs.iter().map(VendorLeg::line_cost).sum();
        if total_cost != record.total_cost {
            return Err(DomainError::validation(format!(
                "transaction {}: total_cost {} does not match legs ({total_cost})",
                record.id, record.total_cost
            )));
        }

        // Terminal statuses set outside the delivery flow are kept; the rest
        // is recomputed from the legs.
        let status = match record.status {
            TransactionStatus::Cancelled | TransactionStatus::Completed => record.status,
            TransactionStatus::Pending => derive_status(&legs, TransactionStatus::Pending),
            _ => derive_status(&legs, TransactionStatus::InTransit),
        };

        Ok(PurchaseTransaction {
            id: record.id,
            sku_id: record.sku_id,
            sku_name: record.sku_name,
            legs,
            total_cost,
            status,
            expected_delivery_date: record.expected_delivery_date,
            created_at: record.created_at,
            version: record.version,
            created: true,
        })
    }
}

fn check_len(
    id: TransactionId,
    field: &str,
    len: usize,
    expected: usize,
    may_be_empty: bool,
) -> Result<(), DomainError> {
    if len == expected || (may_be_empty && len == 0) {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "transaction {id}: {field} has {len} entries, expected {expected}"
        )))
    }
}
