//! Persistence boundary for the procurement workflows.
//!
//! The repository stores rows in their persisted shape (`Sku`,
//! `StoredConstraint`, `TransactionRecord`, ...); parsing into domain types
//! happens in the orchestrator. Lookups return `Option` rather than a
//! not-found error.
//!
//! ## Concurrency
//!
//! SKU and transaction rows carry a version. `update_sku_stock` and
//! `update_transaction_legs` take the version the caller read
//! (`ExpectedVersion::Exact`) and fail with `RepositoryError::Concurrency`
//! when the stored row has moved on. Individual calls are atomic; the
//! repository does not group calls into transactions.

#[cfg(test)]
mod faulty;
mod in_memory;

#[cfg(test)]
pub(crate) use faulty::{FaultKind, FaultyRepository};
pub use in_memory::{InMemoryRepository, Snapshot};

use restock_constraints::{GlobalConstraint, GlobalConstraintKind, StoredConstraint};
use restock_core::{ConstraintId, ExpectedVersion, SkuId, TransactionId};
use restock_inventory::{SalesRecord, Sku, VendorOffer};
use restock_purchasing::{MonthRange, TransactionRecord};

use crate::activity::{ActivityFilter, ActivityLogEntry};
use crate::error::RepositoryError;

#[async_trait::async_trait]
pub trait ProcurementRepository: Send + Sync {
    async fn get_sku(&self, sku_id: SkuId) -> Result<Option<Sku>, RepositoryError>;

    /// Case-insensitive lookup by SKU name.
    async fn find_sku_by_name(&self, name: &str) -> Result<Option<Sku>, RepositoryError>;

    /// All SKUs, ordered by name.
    async fn list_skus(&self) -> Result<Vec<Sku>, RepositoryError>;

    /// Fails with `Integrity` if the id or the (case-insensitive) name is taken.
    async fn insert_sku(&self, sku: &Sku) -> Result<(), RepositoryError>;

    /// Store a new stock level. `expected` is checked against the stored version.
    async fn update_sku_stock(
        &self,
        sku: &Sku,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError>;

    async fn list_constraints(
        &self,
        sku_id: SkuId,
    ) -> Result<Vec<StoredConstraint>, RepositoryError>;

    async fn add_constraint(&self, constraint: &StoredConstraint) -> Result<(), RepositoryError>;

    /// Returns whether a row was removed.
    async fn delete_constraint(&self, id: ConstraintId) -> Result<bool, RepositoryError>;

    async fn list_global_constraints(&self) -> Result<Vec<GlobalConstraint>, RepositoryError>;

    /// Insert or replace the row of the same kind.
    async fn upsert_global_constraint(
        &self,
        constraint: &GlobalConstraint,
    ) -> Result<(), RepositoryError>;

    async fn delete_global_constraint(
        &self,
        kind: GlobalConstraintKind,
    ) -> Result<bool, RepositoryError>;

    async fn list_vendor_offers(&self, sku_id: SkuId) -> Result<Vec<VendorOffer>, RepositoryError>;

    /// Sales history, oldest first.
    async fn list_sales_history(
        &self,
        sku_id: SkuId,
    ) -> Result<Vec<SalesRecord>, RepositoryError>;

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), RepositoryError>;

    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, RepositoryError>;

    /// Store new leg statuses, overall status and version for an existing row.
    async fn update_transaction_legs(
        &self,
        record: &TransactionRecord,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError>;

    /// Transactions whose stored status is not terminal, oldest first.
    async fn list_active_transactions(
        &self,
        sku_id: Option<SkuId>,
    ) -> Result<Vec<TransactionRecord>, RepositoryError>;

    /// Transactions created within `range`, whatever their status.
    async fn list_transactions_in_month(
        &self,
        range: MonthRange,
    ) -> Result<Vec<TransactionRecord>, RepositoryError>;

    async fn append_activity_log(&self, entry: &ActivityLogEntry) -> Result<(), RepositoryError>;

    async fn list_activity_log(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityLogEntry>, RepositoryError>;
}
