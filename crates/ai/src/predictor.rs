use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use restock_constraints::Constraint;
use restock_core::SkuId;
use restock_inventory::{SalesRecord, VendorOffer};

/// Everything the predictor is given for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandRequest {
    pub sku_id: SkuId,
    pub sku_name: String,
    pub current_units: u64,
    /// Units already ordered and not yet delivered.
    pub in_transit_units: u64,
    pub sales_history: Vec<SalesRecord>,
    pub vendor_offers: Vec<VendorOffer>,
    pub constraints: Vec<Constraint>,
    pub remaining_budget: Option<Decimal>,
}

/// One leg of a proposed vendor split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedLeg {
    pub vendor: String,
    pub quantity: u64,
    /// The unit cost the model quoted, if any. Informational only.
    pub unit_cost: Option<Decimal>,
}

/// A validated demand estimate.
///
/// When `legs` is non-empty their quantities sum to `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandEstimate {
    pub amount: u64,
    pub legs: Vec<ProposedLeg>,
    pub reasoning: String,
    pub constraint_blocked: bool,
}

impl DemandEstimate {
    /// An estimate with no vendor split.
    pub fn amount_only(amount: u64, reasoning: impl Into<String>) -> Self {
        Self {
            amount,
            legs: Vec::new(),
            reasoning: reasoning.into(),
            constraint_blocked: false,
        }
    }

    pub fn with_leg(mut self, vendor: impl Into<String>, quantity: u64) -> Self {
        self.legs.push(ProposedLeg {
            vendor: vendor.into(),
            quantity,
            unit_cost: None,
        });
        self
    }

    pub fn blocked(reasoning: impl Into<String>) -> Self {
        Self {
            amount: 0,
            legs: Vec::new(),
            reasoning: reasoning.into(),
            constraint_blocked: true,
        }
    }

    pub fn vendors(&self) -> Vec<String> {
        self.legs.iter().map(|l| l.vendor.clone()).collect()
    }

    /// The model wanted to order but reported that constraints prevent it.
    pub fn is_ai_detected_block(&self) -> bool {
        self.constraint_blocked && self.amount == 0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PredictorError {
    #[error("invalid predictor output: {0}")]
    InvalidInput(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("could not parse predictor response: {0}")]
    Unparseable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// External demand estimation.
#[async_trait::async_trait]
pub trait DemandPredictor: Send + Sync {
    async fn estimate_demand(
        &self,
        request: &DemandRequest,
    ) -> Result<DemandEstimate, PredictorError>;
}

#[async_trait::async_trait]
impl<P> DemandPredictor for Arc<P>
where
    P: DemandPredictor + ?Sized,
{
    async fn estimate_demand(
        &self,
        request: &DemandRequest,
    ) -> Result<DemandEstimate, PredictorError> {
        (**self).estimate_demand(request).await
    }
}
