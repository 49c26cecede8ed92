//! Reference data attached to a SKU.
//!
//! Vendor offers and sales history are supplied from outside (bulk import) and
//! are read-only to the procurement engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use restock_core::SkuId;

/// One vendor's standing offer for a SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorOffer {
    pub sku_id: SkuId,
    pub vendor_name: String,
    /// Unit cost.
    pub cost_price: Decimal,
    pub delivery_time_days: u32,
    #[serde(default)]
    pub min_order_quantity: u64,
}

impl VendorOffer {
    pub fn new(
        sku_id: SkuId,
        vendor_name: impl Into<String>,
        cost_price: Decimal,
        delivery_time_days: u32,
    ) -> Self {
        Self {
            sku_id,
            vendor_name: vendor_name.into(),
            cost_price,
            delivery_time_days,
            min_order_quantity: 0,
        }
    }
}

/// A dated sales observation (units sold on `date`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub sku_id: SkuId,
    pub date: NaiveDate,
    pub value: u64,
}
