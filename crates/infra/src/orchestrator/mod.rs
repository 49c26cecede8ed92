//! Procurement workflows.
//!
//! **Responsibility:** compose the pure domain crates with the injected
//! repository, predictor and clock.
//!
//! ```text
//! evaluate-and-order   resolve SKU -> incoming -> (estimate) -> validate
//!                      -> select vendor per leg -> create transaction
//! receive delivery     claim leg(s) on the transaction row -> credit stock
//!                      (credit failed: release the claimed legs)
//! ```
//!
//! Every repository and predictor call is bounded by the configured timeout;
//! a timeout is `UpstreamUnavailable` and the workflow stops before any
//! write. Stale writes (`Conflict`) are retried from a fresh read up to
//! `max_conflict_retries` times.
//!
//! Audit entries are written after the state change they describe. A failed
//! audit write is logged and does not undo or fail the workflow.

mod batch;
mod buy;
mod constraints;
mod delivery;
mod intent;
mod stock;

pub use batch::{ReplenishmentReport, SkuOutcome};
pub use buy::{BlockReason, DemandSource, OrderDecision, OrderRequest, SkuRef};
pub use delivery::{DeliveryLine, DeliveryReadiness, DeliverySweepReport, SweepFailure, SweptLeg};
pub use intent::IntentOutcome;
pub use stock::{StockAssessment, StockVerdict};

use std::future::Future;
use std::time::Duration;

use restock_ai::{DemandEstimate, DemandPredictor, DemandRequest};
use restock_constraints::{GlobalConstraints, StoredConstraint};
use restock_core::{Event, SkuId, TransactionId};
use restock_inventory::Sku;
use restock_purchasing::{
    BudgetTracker, MonthRange, PurchaseTransaction, TransactionRecord, incoming_units,
};

use crate::activity::{ActivityFilter, ActivityLogEntry};
use crate::clock::{Clock, SystemClock};
use crate::config::ProcurementConfig;
use crate::error::{ProcurementError, RepositoryError, Upstream};
use crate::repository::ProcurementRepository;

/// Entry point for every procurement workflow.
///
/// Generic over its collaborators so tests run against
/// `InMemoryRepository`, `ScriptedPredictor` and `FixedClock`.
#[derive(Debug)]
pub struct ProcurementOrchestrator<R, P, C = SystemClock> {
    repository: R,
    predictor: P,
    clock: C,
    config: ProcurementConfig,
}

impl<R, P> ProcurementOrchestrator<R, P, SystemClock> {
    pub fn new(repository: R, predictor: P, config: ProcurementConfig) -> Self {
        Self::with_clock(repository, predictor, SystemClock, config)
    }
}

impl<R, P, C> ProcurementOrchestrator<R, P, C> {
    pub fn with_clock(repository: R, predictor: P, clock: C, config: ProcurementConfig) -> Self {
        Self {
            repository,
            predictor,
            clock,
            config,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &ProcurementConfig {
        &self.config
    }
}

impl<R, P, C> ProcurementOrchestrator<R, P, C>
where
    R: ProcurementRepository,
    P: DemandPredictor,
    C: Clock,
{
    /// Audit entries, newest first.
    pub async fn activity_log(
        &self,
        filter: &ActivityFilter,
    ) -> Result<Vec<ActivityLogEntry>, ProcurementError> {
        self.repo("list_activity_log", self.repository.list_activity_log(filter))
            .await
    }

    /// Run a repository call under the repository timeout.
    async fn repo<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, ProcurementError> {
        let timeout = self.config.repository_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result.map_err(ProcurementError::from),
            Err(_) => {
                tracing::warn!(op, timeout_ms = timeout.as_millis() as u64, "repository call timed out");
                Err(timed_out(Upstream::Repository, op, timeout))
            }
        }
    }

    /// Ask the predictor, under the predictor timeout.
    async fn estimate(&self, request: &DemandRequest) -> Result<DemandEstimate, ProcurementError> {
        let timeout = self.config.predictor_timeout();
        match tokio::time::timeout(timeout, self.predictor.estimate_demand(request)).await {
            Ok(Ok(estimate)) => {
                tracing::debug!(
                    sku = %request.sku_id,
                    amount = estimate.amount,
                    legs = estimate.legs.len(),
                    "demand estimated"
                );
                Ok(estimate)
            }
            Ok(Err(err)) => {
                tracing::warn!(sku = %request.sku_id, error = %err, "demand estimation failed");
                Err(err.into())
            }
            Err(_) => {
                tracing::warn!(sku = %request.sku_id, "demand estimation timed out");
                Err(timed_out(Upstream::Predictor, "estimate_demand", timeout))
            }
        }
    }

    /// Build the predictor request for `sku`.
    async fn demand_request(
        &self,
        sku: &Sku,
        constraint_rows: &[StoredConstraint],
        in_transit_units: u64,
        remaining_budget: Option<rust_decimal::Decimal>,
    ) -> Result<DemandRequest, ProcurementError> {
        let sku_id = sku.id_typed();
        let sales_history = self
            .repo("list_sales_history", self.repository.list_sales_history(sku_id))
            .await?;
        let vendor_offers = self
            .repo("list_vendor_offers", self.repository.list_vendor_offers(sku_id))
            .await?;
        Ok(DemandRequest {
            sku_id,
            sku_name: sku.name().to_string(),
            current_units: sku.current_units(),
            in_transit_units,
            sales_history,
            vendor_offers,
            constraints: constraint_rows.iter().filter_map(|r| r.parse().ok()).collect(),
            remaining_budget,
        })
    }

    /// Best-effort audit write.
    async fn audit(&self, entry: ActivityLogEntry) {
        if let Err(err) = self
            .repo("append_activity_log", self.repository.append_activity_log(&entry))
            .await
        {
            tracing::warn!(
                action = ?entry.action_type,
                sku = ?entry.sku_id,
                error = %err,
                "failed to write activity log entry"
            );
        }
    }

    async fn resolve_sku(&self, sku: &SkuRef) -> Result<Sku, ProcurementError> {
        let found = match sku {
            SkuRef::Id(id) => self.repo("get_sku", self.repository.get_sku(*id)).await?,
            SkuRef::Name(name) => {
                self.repo("find_sku_by_name", self.repository.find_sku_by_name(name))
                    .await?
            }
        };
        found.ok_or_else(|| ProcurementError::not_found(format!("sku '{sku}'")))
    }

    async fn get_sku(&self, sku_id: SkuId) -> Result<Sku, ProcurementError> {
        self.resolve_sku(&SkuRef::Id(sku_id)).await
    }

    async fn load_transaction(
        &self,
        id: TransactionId,
    ) -> Result<PurchaseTransaction, ProcurementError> {
        let record = self
            .repo("get_transaction", self.repository.get_transaction(id))
            .await?
            .ok_or_else(|| ProcurementError::not_found(format!("transaction {id}")))?;
        Ok(PurchaseTransaction::try_from(record)?)
    }

    /// Active transactions that load cleanly; malformed rows are logged and skipped.
    async fn active_transactions(
        &self,
        sku_id: Option<SkuId>,
    ) -> Result<Vec<PurchaseTransaction>, ProcurementError> {
        let records = self
            .repo(
                "list_active_transactions",
                self.repository.list_active_transactions(sku_id),
            )
            .await?;
        Ok(load_records(records))
    }

    async fn incoming_for(&self, sku_id: SkuId) -> Result<u64, ProcurementError> {
        let active = self.active_transactions(Some(sku_id)).await?;
        Ok(incoming_units(&active, sku_id))
    }

    /// Spend so far this month against the global `monthly_budget`.
    async fn budget_tracker(&self) -> Result<BudgetTracker, ProcurementError> {
        let rows = self
            .repo(
                "list_global_constraints",
                self.repository.list_global_constraints(),
            )
            .await?;
        let globals = GlobalConstraints::from_rows(&rows);

        let range = MonthRange::containing(self.clock.now());
        let records = self
            .repo(
                "list_transactions_in_month",
                self.repository.list_transactions_in_month(range),
            )
            .await?;
        let month = load_records(records);
        Ok(BudgetTracker::from_transactions(
            globals.monthly_budget(),
            &month,
            range,
            self.config.spend_policy,
        ))
    }

    fn retries_left(&self, attempt: u32) -> bool {
        attempt < self.config.max_conflict_retries
    }
}

fn load_records(records: Vec<TransactionRecord>) -> Vec<PurchaseTransaction> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id;
            match PurchaseTransaction::try_from(record) {
                Ok(tx) => Some(tx),
                Err(err) => {
                    tracing::warn!(transaction = %id, error = %err, "skipping malformed transaction row");
                    None
                }
            }
        })
        .collect()
}

/// Trace the domain events an aggregate emitted before they are persisted.
fn log_events<E: Event>(events: &[E]) {
    for event in events {
        tracing::debug!(
            event = event.event_type(),
            event_version = event.version(),
            occurred_at = %event.occurred_at(),
            "domain event"
        );
    }
}

fn timed_out(upstream: Upstream, op: &str, timeout: Duration) -> ProcurementError {
    ProcurementError::UpstreamUnavailable {
        upstream,
        reason: format!("{op} timed out after {} ms", timeout.as_millis()),
    }
}
