//! Purchasing domain module (multi-vendor purchase transactions).
//!
//! This crate contains the transaction lifecycle and the pure procurement
//! calculations that feed it (vendor selection, incoming stock, monthly
//! spend). No IO, no storage.

pub mod budget;
pub mod incoming;
pub mod record;
pub mod selector;
pub mod transaction;

pub use budget::{BudgetTracker, MonthRange, SpendPolicy};
pub use incoming::{effective_need, incoming_units};
pub use record::TransactionRecord;
pub use selector::select_vendor;
pub use transaction::{
    CancelTransaction, CreateTransaction, DeliverLeg, DeliverPending, DeliveredLeg,
    DeliveryTrigger, LegSpec, LegStatus, LegsDelivered, LegsReleased, PurchaseTransaction,
    PurchaseTransactionCommand, PurchaseTransactionEvent, ReleaseLegs, TransactionCancelled,
    TransactionCreated, TransactionStatus, VendorLeg,
};
