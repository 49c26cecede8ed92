use serde::{Deserialize, Serialize};
use serde_json::json;

use restock_ai::DemandPredictor;
use restock_core::{Aggregate, AggregateRoot, ExpectedVersion, SkuId};
use restock_inventory::{RecordSale, Sku, SkuCommand};
use restock_purchasing::effective_need;

use super::{ProcurementOrchestrator, SkuRef, log_events};
use crate::activity::{ActionType, ActivityLogEntry, Actor};
use crate::clock::Clock;
use crate::error::ProcurementError;
use crate::repository::ProcurementRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockVerdict {
    /// The predictor sees no further need.
    Sufficient,
    /// There is a need, but pending orders cover it.
    CoveredByIncoming,
    Reorder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAssessment {
    pub sku_id: SkuId,
    pub sku_name: String,
    pub current_units: u64,
    pub incoming_units: u64,
    pub predicted_need: u64,
    /// `max(0, predicted_need - incoming_units)`.
    pub effective_need: u64,
    pub verdict: StockVerdict,
}

impl StockAssessment {
    fn new(sku: &Sku, incoming_units: u64, predicted_need: u64) -> Self {
        let effective = effective_need(predicted_need, incoming_units);
        let verdict = if predicted_need == 0 {
            StockVerdict::Sufficient
        } else if effective == 0 {
            StockVerdict::CoveredByIncoming
        } else {
            StockVerdict::Reorder
        };
        Self {
            sku_id: sku.id_typed(),
            sku_name: sku.name().to_string(),
            current_units: sku.current_units(),
            incoming_units,
            predicted_need,
            effective_need: effective,
            verdict,
        }
    }
}

impl<R, P, C> ProcurementOrchestrator<R, P, C>
where
    R: ProcurementRepository,
    P: DemandPredictor,
    C: Clock,
{
    /// Record a sale. Fails with `InsufficientStock` (stock untouched) when
    /// the quantity exceeds what is on hand.
    pub async fn sell(&self, sku: SkuRef, quantity: u64) -> Result<Sku, ProcurementError> {
        let mut attempt = 0;
        let sold = loop {
            let mut current = self.resolve_sku(&sku).await?;
            let read_version = current.version();
            let events = current.execute(&SkuCommand::RecordSale(RecordSale {
                sku_id: current.id_typed(),
                quantity,
                occurred_at: self.clock.now(),
            }))?;
            log_events(&events);
            match self
                .repo(
                    "update_sku_stock",
                    self.repository
                        .update_sku_stock(&current, ExpectedVersion::Exact(read_version)),
                )
                .await
            {
                Ok(()) => break current,
                Err(err) if err.is_conflict() && self.retries_left(attempt) => {
                    attempt += 1;
                    tracing::debug!(sku = %current.id_typed(), attempt, "sale conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        };

        self.audit(
            ActivityLogEntry::new(Actor::User, ActionType::Sale, self.clock.now())
                .for_sku(sold.id_typed(), sold.name())
                .with_details(json!({
                    "quantity": quantity,
                    "remaining_units": sold.current_units(),
                })),
        )
        .await;
        tracing::info!(
            sku = %sold.id_typed(),
            quantity,
            remaining = sold.current_units(),
            "sale recorded"
        );
        Ok(sold)
    }

    /// Compare predicted need with on-hand and incoming stock. Read-only.
    pub async fn check_stock(&self, sku: SkuRef) -> Result<StockAssessment, ProcurementError> {
        let sku = self.resolve_sku(&sku).await?;
        let sku_id = sku.id_typed();
        let incoming = self.incoming_for(sku_id).await?;
        let constraint_rows = self
            .repo("list_constraints", self.repository.list_constraints(sku_id))
            .await?;
        let remaining = self.budget_tracker().await?.remaining();
        let request = self
            .demand_request(&sku, &constraint_rows, incoming, remaining)
            .await?;
        let estimate = self.estimate(&request).await?;
        Ok(StockAssessment::new(&sku, incoming, estimate.amount))
    }
}
