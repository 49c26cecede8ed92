use serde::{Deserialize, Serialize};

use restock_ai::{ChatIntent, DemandPredictor, Intent};

use super::{OrderDecision, OrderRequest, ProcurementOrchestrator, SkuRef, StockAssessment};
use crate::clock::Clock;
use crate::error::ProcurementError;
use crate::repository::ProcurementRepository;

/// Result of dispatching a chat intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum IntentOutcome {
    Order { decision: OrderDecision },
    Sold {
        sku_name: String,
        quantity: u64,
        remaining_units: u64,
    },
    Stock { assessment: StockAssessment },
    /// `QUERY`/`OTHER`: the model's own reply.
    Reply { text: String },
}

fn required_sku(intent: &ChatIntent) -> Result<SkuRef, ProcurementError> {
    intent
        .sku
        .as_deref()
        .map(SkuRef::from)
        .ok_or_else(|| ProcurementError::invalid_input("intent is missing a sku"))
}

impl<R, P, C> ProcurementOrchestrator<R, P, C>
where
    R: ProcurementRepository,
    P: DemandPredictor,
    C: Clock,
{
    /// Route a structured chat intent to the matching workflow.
    pub async fn handle_intent(
        &self,
        intent: ChatIntent,
    ) -> Result<IntentOutcome, ProcurementError> {
        match intent.intent {
            Intent::Buy => {
                let sku = required_sku(&intent)?;
                let mut request = match intent.quantity {
                    Some(quantity) => OrderRequest::explicit(sku, quantity),
                    None => OrderRequest::predicted(sku),
                };
                request.preferred_vendor = intent.vendor;
                let decision = self.place_order(request).await?;
                Ok(IntentOutcome::Order { decision })
            }
            Intent::Sell => {
                let sku = required_sku(&intent)?;
                let quantity = intent
                    .quantity
                    .ok_or_else(|| ProcurementError::invalid_input("sell intent needs a quantity"))?;
                let sold = self.sell(sku, quantity).await?;
                Ok(IntentOutcome::Sold {
                    sku_name: sold.name().to_string(),
                    quantity,
                    remaining_units: sold.current_units(),
                })
            }
            Intent::CheckStock => {
                let assessment = self.check_stock(required_sku(&intent)?).await?;
                Ok(IntentOutcome::Stock { assessment })
            }
            Intent::Query | Intent::Other => Ok(IntentOutcome::Reply {
                text: intent.response_text.unwrap_or_default(),
            }),
        }
    }
}
