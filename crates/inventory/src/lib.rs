//! Inventory domain module.
//!
//! This crate contains the SKU aggregate and the read-only reference data
//! attached to a SKU (vendor offers, sales history). Pure domain logic, no IO.

pub mod sku;
pub mod vendor;

pub use sku::{
    ReceiveStock, RecordSale, RegisterSku, SaleRecorded, Sku, SkuCommand, SkuEvent, SkuRegistered,
    StockReceived,
};
pub use vendor::{SalesRecord, VendorOffer};
