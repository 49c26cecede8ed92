use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use restock_constraints::{GlobalConstraint, GlobalConstraintKind, StoredConstraint};
use restock_core::{AggregateRoot, ConstraintId, ExpectedVersion, SkuId, TransactionId};
use restock_inventory::{SalesRecord, Sku, VendorOffer};
use restock_purchasing::{MonthRange, TransactionRecord};

use super::ProcurementRepository;
use crate::activity::{ActivityFilter, ActivityLogEntry};
use crate::error::RepositoryError;

/// Serializable image of the whole repository.
///
/// The CLI keeps its state as one of these in a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub skus: Vec<Sku>,
    pub constraints: Vec<StoredConstraint>,
    pub global_constraints: Vec<GlobalConstraint>,
    pub vendor_offers: Vec<VendorOffer>,
    pub sales_history: Vec<SalesRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub activity_log: Vec<ActivityLogEntry>,
}

#[derive(Debug, Default)]
struct State {
    skus: HashMap<SkuId, Sku>,
    constraints: Vec<StoredConstraint>,
    global_constraints: Vec<GlobalConstraint>,
    vendor_offers: Vec<VendorOffer>,
    sales_history: Vec<SalesRecord>,
    transactions: HashMap<TransactionId, TransactionRecord>,
    activity_log: Vec<ActivityLogEntry>,
}

impl State {
    fn name_taken(&self, name: &str, except: SkuId) -> bool {
        self.skus
            .values()
            .any(|s| s.id_typed() != except && s.name().eq_ignore_ascii_case(name.trim()))
    }

    fn require_sku(&self, sku_id: SkuId) -> Result<(), RepositoryError> {
        if self.skus.contains_key(&sku_id) {
            Ok(())
        } else {
            Err(RepositoryError::Integrity(format!("unknown sku {sku_id}")))
        }
    }
}

/// In-memory repository.
///
/// Intended for tests, dev and the CLI. One lock guards the whole state, so
/// every call is atomic.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, RepositoryError> {
        let repo = Self::new();
        {
            let mut state = repo.write()?;
            for sku in snapshot.skus {
                if state.skus.contains_key(&sku.id_typed()) || state.name_taken(sku.name(), sku.id_typed()) {
                    return Err(RepositoryError::Integrity(format!(
                        "duplicate sku '{}'",
                        sku.name()
                    )));
                }
                state.skus.insert(sku.id_typed(), sku);
            }
            state.constraints = snapshot.constraints;
            state.global_constraints = snapshot.global_constraints;
            state.vendor_offers = snapshot.vendor_offers;
            state.sales_history = snapshot.sales_history;
            for record in snapshot.transactions {
                state.transactions.insert(record.id, record);
            }
            state.activity_log = snapshot.activity_log;
        }
        Ok(repo)
    }

    /// Current contents, in a stable order.
    pub fn snapshot(&self) -> Result<Snapshot, RepositoryError> {
        let state = self.read()?;
        let mut skus: Vec<Sku> = state.skus.values().cloned().collect();
        skus.sort_by(|a, b| a.name().cmp(b.name()).then(a.id_typed().cmp(&b.id_typed())));
        let mut transactions: Vec<TransactionRecord> =
            state.transactions.values().cloned().collect();
        transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(Snapshot {
            skus,
            constraints: state.constraints.clone(),
            global_constraints: state.global_constraints.clone(),
            vendor_offers: state.vendor_offers.clone(),
            sales_history: state.sales_history.clone(),
            transactions,
            activity_log: state.activity_log.clone(),
        })
    }

    /// Seed a vendor offer for an existing SKU.
    pub fn add_vendor_offer(&self, offer: VendorOffer) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state.require_sku(offer.sku_id)?;
        state.vendor_offers.push(offer);
        Ok(())
    }

    /// Seed a sales history row for an existing SKU.
    pub fn add_sales_record(&self, record: SalesRecord) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state.require_sku(record.sku_id)?;
        state.sales_history.push(record);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, RepositoryError> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, RepositoryError> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))
    }
}

fn sorted_oldest_first(mut records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    records
}

#[async_trait::async_trait]
impl ProcurementRepository for InMemoryRepository {
    async fn get_sku(&self, sku_id: SkuId) -> Result<Option<Sku>, RepositoryError> {
        Ok(self.read()?.skus.get(&sku_id).cloned())
    }

    async fn find_sku_by_name(&self, name: &str) -> Result<Option<Sku>, RepositoryError> {
        let needle = name.trim();
        Ok(self
            .read()?
            .skus
            .values()
            .find(|s| s.name().eq_ignore_ascii_case(needle))
            .cloned())
    }

    async fn list_skus(&self) -> Result<Vec<Sku>, RepositoryError> {
        let mut skus: Vec<Sku> = self.read()?.skus.values().cloned().collect();
        skus.sort_by(|a, b| a.name().cmp(b.name()).then(a.id_typed().cmp(&b.id_typed())));
        Ok(skus)
    }

    async fn insert_sku(&self, sku: &Sku) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        if state.skus.contains_key(&sku.id_typed()) {
            return Err(RepositoryError::Integrity(format!(
                "sku {} already exists",
                sku.id_typed()
            )));
        }
        if state.name_taken(sku.name(), sku.id_typed()) {
            return Err(RepositoryError::Integrity(format!(
                "sku name '{}' already exists",
                sku.name()
            )));
        }
        state.skus.insert(sku.id_typed(), sku.clone());
        Ok(())
    }

    async fn update_sku_stock(
        &self,
        sku: &Sku,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let stored = state
            .skus
            .get_mut(&sku.id_typed())
            .ok_or_else(|| RepositoryError::Integrity(format!("unknown sku {}", sku.id_typed())))?;

        let current = stored.version();
        if !expected.matches(current) {
            return Err(RepositoryError::Concurrency(format!(
                "sku {}: expected {expected:?}, found {current}",
                sku.id_typed()
            )));
        }
        *stored = sku.clone();
        Ok(())
    }

    async fn list_constraints(
        &self,
        sku_id: SkuId,
    ) -> Result<Vec<StoredConstraint>, RepositoryError> {
        Ok(self
            .read()?
            .constraints
            .iter()
            .filter(|c| c.sku_id == sku_id)
            .cloned()
            .collect())
    }

    async fn add_constraint(&self, constraint: &StoredConstraint) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state.require_sku(constraint.sku_id)?;
        if state.constraints.iter().any(|c| c.id == constraint.id) {
            return Err(RepositoryError::Integrity(format!(
                "constraint {} already exists",
                constraint.id
            )));
        }
        state.constraints.push(constraint.clone());
        Ok(())
    }

    async fn delete_constraint(&self, id: ConstraintId) -> Result<bool, RepositoryError> {
        let mut state = self.write()?;
        let before = state.constraints.len();
        state.constraints.retain(|c| c.id != id);
        Ok(state.constraints.len() != before)
    }

    async fn list_global_constraints(&self) -> Result<Vec<GlobalConstraint>, RepositoryError> {
        Ok(self.read()?.global_constraints.clone())
    }

    async fn upsert_global_constraint(
        &self,
        constraint: &GlobalConstraint,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state
            .global_constraints
            .retain(|c| c.constraint_type != constraint.constraint_type);
        state.global_constraints.push(constraint.clone());
        Ok(())
    }

    async fn delete_global_constraint(
        &self,
        kind: GlobalConstraintKind,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.write()?;
        let before = state.global_constraints.len();
        state.global_constraints.retain(|c| c.constraint_type != kind);
        Ok(state.global_constraints.len() != before)
    }

    async fn list_vendor_offers(&self, sku_id: SkuId) -> Result<Vec<VendorOffer>, RepositoryError> {
        Ok(self
            .read()?
            .vendor_offers
            .iter()
            .filter(|o| o.sku_id == sku_id)
            .cloned()
            .collect())
    }

    async fn list_sales_history(
        &self,
        sku_id: SkuId,
    ) -> Result<Vec<SalesRecord>, RepositoryError> {
        let mut history: Vec<SalesRecord> = self
            .read()?
            .sales_history
            .iter()
            .filter(|r| r.sku_id == sku_id)
            .cloned()
            .collect();
        history.sort_by_key(|r| r.date);
        Ok(history)
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        state.require_sku(record.sku_id)?;
        if state.transactions.contains_key(&record.id) {
            return Err(RepositoryError::Integrity(format!(
                "transaction {} already exists",
                record.id
            )));
        }
        state.transactions.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, RepositoryError> {
        Ok(self.read()?.transactions.get(&id).cloned())
    }

    async fn update_transaction_legs(
        &self,
        record: &TransactionRecord,
        expected: ExpectedVersion,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let stored = state.transactions.get_mut(&record.id).ok_or_else(|| {
            RepositoryError::Integrity(format!("unknown transaction {}", record.id))
        })?;

        if !expected.matches(stored.version) {
            return Err(RepositoryError::Concurrency(format!(
                "transaction {}: expected {expected:?}, found {}",
                record.id, stored.version
            )));
        }
        if record.vendor_statuses.len() != stored.vendors.len() {
            return Err(RepositoryError::Integrity(format!(
                "transaction {}: {} leg statuses for {} legs",
                record.id,
                record.vendor_statuses.len(),
                stored.vendors.len()
            )));
        }
        stored.vendor_statuses = record.vendor_statuses.clone();
        stored.status = record.status;
        stored.version = record.version;
        Ok(())
    }

    async fn list_active_transactions(
        &self,
        sku_id: Option<SkuId>,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let records = self
            .read()?
            .transactions
            .values()
            .filter(|r| r.status.is_active())
            .filter(|r| sku_id.is_none_or(|id| r.sku_id == id))
            .cloned()
            .collect();
        Ok(sorted_oldest_first(records))
    }

    async fn list_transactions_in_month(
        &self,
        range: MonthRange,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let records = self
            .read()?
            .transactions
            .values()
            .filter(|r| range.contains(r.created_at))
            .cloned()
            .collect();
        Ok(sorted_oldest_first(records))
    }

    async fn append_activity_log(&self, entry: &ActivityLogEntry) -> Result<(), RepositoryError> {
        self.write()?.activity_log.push(entry.clone());
        Ok(())
    }

    async fn list_activity_log(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityLogEntry>, RepositoryError> {
        let state = self.read()?;
        let matching = state
            .activity_log
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }
}
