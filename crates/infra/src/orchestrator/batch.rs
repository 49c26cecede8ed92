//! Batch replenishment pass over every SKU.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use restock_ai::DemandPredictor;
use restock_core::{AggregateRoot, SkuId};

use super::{OrderDecision, OrderRequest, ProcurementOrchestrator};
use crate::clock::Clock;
use crate::error::ProcurementError;
use crate::repository::ProcurementRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SkuOutcome {
    Decided { decision: OrderDecision },
    /// Lookup, predictor or repository failure for this SKU only.
    Failed {
        sku_id: SkuId,
        sku_name: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentReport {
    pub outcomes: Vec<SkuOutcome>,
    pub monthly_spent: Decimal,
    pub remaining_budget: Option<Decimal>,
}

impl ReplenishmentReport {
    pub fn placed(&self) -> impl Iterator<Item = &OrderDecision> {
        self.outcomes.iter().filter_map(|o| match o {
            SkuOutcome::Decided { decision } if decision.is_placed() => Some(decision),
            _ => None,
        })
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SkuOutcome::Failed { .. }))
            .count()
    }
}

impl<R, P, C> ProcurementOrchestrator<R, P, C>
where
    R: ProcurementRepository,
    P: DemandPredictor,
    C: Clock,
{
    /// Evaluate-and-order for every SKU, as the automatic pipeline.
    ///
    /// SKUs are processed in name order and share one budget tracker, so
    /// each placed order reduces what later SKUs may spend. A failure for
    /// one SKU is recorded and the pass continues.
    pub async fn run_replenishment(&self) -> Result<ReplenishmentReport, ProcurementError> {
        let skus = self.repo("list_skus", self.repository.list_skus()).await?;
        let mut budget = self.budget_tracker().await?;
        let mut outcomes = Vec::with_capacity(skus.len());

        for sku in &skus {
            let request = OrderRequest::automatic(sku.id_typed());
            match self.evaluate_and_order(&request, &mut budget).await {
                Ok(decision) => outcomes.push(SkuOutcome::Decided { decision }),
                Err(err) => {
                    tracing::warn!(sku = %sku.id(), error = %err, "replenishment failed for sku");
                    outcomes.push(SkuOutcome::Failed {
                        sku_id: sku.id_typed(),
                        sku_name: sku.name().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let report = ReplenishmentReport {
            outcomes,
            monthly_spent: budget.monthly_spent(),
            remaining_budget: budget.remaining(),
        };
        tracing::info!(
            skus = skus.len(),
            placed = report.placed().count(),
            failed = report.failed_count(),
            "replenishment pass complete"
        );
        Ok(report)
    }
}
