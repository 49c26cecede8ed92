//! Fault-injecting repository for workflow tests.
//!
//! Wraps [`InMemoryRepository`] and makes chosen calls fail with
//! `Unavailable` or never complete (so the orchestrator's timeout fires).
//! Calls without a matching fault go straight to the wrapped repository.

use std::sync::Mutex;

use restock_constraints::{GlobalConstraint, GlobalConstraintKind, StoredConstraint};
use restock_core::{ConstraintId, ExpectedVersion, SkuId, TransactionId};
use restock_inventory::{SalesRecord, Sku, VendorOffer};
use restock_purchasing::{MonthRange, TransactionRecord};

use super::{InMemoryRepository, ProcurementRepository};
use crate::activity::{ActivityFilter, ActivityLogEntry};
use crate::error::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Fail,
    Hang,
}

#[derive(Debug, Clone)]
struct Fault {
    op: &'static str,
    sku: Option<SkuId>,
    kind: FaultKind,
}

#[derive(Debug)]
pub struct FaultyRepository {
    inner: InMemoryRepository,
    faults: Mutex<Vec<Fault>>,
}

impl FaultyRepository {
    pub fn new(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &InMemoryRepository {
        &self.inner
    }

    /// Inject a fault into every call of `op`.
    pub fn inject(&self, op: &'static str, kind: FaultKind) {
        self.push(Fault { op, sku: None, kind });
    }

    /// Inject a fault into calls of `op` made for `sku` only.
    pub fn inject_for(&self, op: &'static str, sku: SkuId, kind: FaultKind) {
        self.push(Fault {
            op,
            sku: Some(sku),
            kind,
        });
    }

    pub fn clear(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    fn push(&self, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(fault);
        }
    }

    async fn gate(&self, op: &'static str, sku: Option<SkuId>) -> Result<(), RepositoryError> {
        let kind = self.faults.lock().ok().and_then(|faults| {
            faults
                .iter()
                .find(|f| f.op == op && (f.sku.is_none() || f.sku == sku))
                .map(|f| f.kind)
        });
        match kind {
            None => Ok(()),
            Some(FaultKind::Fail) => Err(RepositoryError::Unavailable(format!(
                "{op}: injected failure"
            ))),
            Some(FaultKind::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[async_trait::async_trait]
impl ProcurementRepository for FaultyRepository {
    async fn get_sku(&self, sku_id: SkuId) -> Result<Option<Sku>, RepositoryError> {
        self.gate("get_sku", Some(sku_id)).await?;
        self.inner.get_sku(sku_id).await
    }

    async fn find_sku_by_name(&self, name: &str) -> Result<Option<Sku>, RepositoryError> {
        self.gate("find_sku_by_name", None).await?;
        self.inner.find_sku_by_name(name).await
    }

    async fn list_skus(&self) -> Result<Vec<Sku>, RepositoryError> {
        self.gate("list_skus", None).await?;
        self.inner.list_skus().await
    }

    async fn insert_sku(&self, sku: &Sku) -> Result<(), RepositoryError> {
        self.gate("insert_sku", Some(sku.id_typed())).await?;
        self.inner.insert_sku(sku).await
    }

    async fn update_sku_stock(
        &self,
        sku: &Sku,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        self.gate("update_sku_stock", Some(sku.id_typed())).await?;
        self.inner.update_sku_stock(sku, expected).await
    }

    async fn list_constraints(
        &self,
        sku_id: SkuId,
    ) -> Result<Vec<StoredConstraint>, RepositoryError> {
        self.gate("list_constraints", Some(sku_id)).await?;
        self.inner.list_constraints(sku_id).await
    }

    async fn add_constraint(&self, constraint: &StoredConstraint) -> Result<(), RepositoryError> {
        self.gate("add_constraint", Some(constraint.sku_id)).await?;
        self.inner.add_constraint(constraint).await
    }

    async fn delete_constraint(&self, id: ConstraintId) -> Result<bool, RepositoryError> {
        self.gate("delete_constraint", None).await?;
        self.inner.delete_constraint(id).await
    }

    async fn list_global_constraints(&self) -> Result<Vec<GlobalConstraint>, RepositoryError> {
        self.gate("list_global_constraints", None).await?;
        self.inner.list_global_constraints().await
    }

    async fn upsert_global_constraint(
        &self,
        constraint: &GlobalConstraint,
    ) -> Result<(), RepositoryError> {
        self.gate("upsert_global_constraint", None).await?;
        self.inner.upsert_global_constraint(constraint).await
    }

    async fn delete_global_constraint(
        &self,
        kind: GlobalConstraintKind,
    ) -> Result<bool, RepositoryError> {
        self.gate("delete_global_constraint", None).await?;
        self.inner.delete_global_constraint(kind).await
    }

    async fn list_vendor_offers(&self, sku_id: SkuId) -> Result<Vec<VendorOffer>, RepositoryError> {
        self.gate("list_vendor_offers", Some(sku_id)).await?;
        self.inner.list_vendor_offers(sku_id).await
    }

    async fn list_sales_history(
        &self,
        sku_id: SkuId,
    ) -> Result<Vec<SalesRecord>, RepositoryError> {
        self.gate("list_sales_history", Some(sku_id)).await?;
        self.inner.list_sales_history(sku_id).await
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), RepositoryError> {
        self.gate("insert_transaction", Some(record.sku_id)).await?;
        self.inner.insert_transaction(record).await
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, RepositoryError> {
        self.gate("get_transaction", None).await?;
        self.inner.get_transaction(id).await
    }

    async fn update_transaction_legs(
        &self,
        record: &TransactionRecord,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        self.gate("update_transaction_legs", Some(record.sku_id)).await?;
        self.inner.update_transaction_legs(record, expected).await
    }

    async fn list_active_transactions(
        &self,
        sku_id: Option<SkuId>,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        self.gate("list_active_transactions", sku_id).await?;
        self.inner.list_active_transactions(sku_id).await
    }

    async fn list_transactions_in_month(
        &self,
        range: MonthRange,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        self.gate("list_transactions_in_month", None).await?;
        self.inner.list_transactions_in_month(range).await
    }

    async fn append_activity_log(&self, entry: &ActivityLogEntry) -> Result<(), RepositoryError> {
        self.gate("append_activity_log", entry.sku_id).await?;
        self.inner.append_activity_log(entry).await
    }

    async fn list_activity_log(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityLogEntry>, RepositoryError> {
        self.gate("list_activity_log", None).await?;
        self.inner.list_activity_log(filter).await
    }
}
