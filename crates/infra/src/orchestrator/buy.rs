//! Evaluate-and-order.
//!
//! One entry point for every way an order can be proposed: an explicit
//! quantity, or a quantity taken from the predictor. The demand source and
//! the actor decide how stock is accounted for:
//!
//! | demand | actor | quantity | `max_quantity` check |
//! |---|---|---|---|
//! | explicit | any | as given | stock + quantity |
//! | predicted | user | amount net of incoming | stock + quantity |
//! | predicted | ai | amount (the predictor saw incoming) | quantity only |
//!
//! Constraint and vendor failures come back as `OrderDecision::Blocked`;
//! only lookups, upstream failures and bad input are errors.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use restock_ai::{DemandEstimate, DemandPredictor};
use restock_constraints::{ConstraintSet, ConstraintViolation, ValidationMode};
use restock_core::{Aggregate, DomainError, SkuId, TransactionId};
use restock_inventory::{Sku, VendorOffer};
use restock_purchasing::{
    BudgetTracker, CreateTransaction, LegSpec, PurchaseTransaction, PurchaseTransactionCommand,
    TransactionRecord, effective_need, select_vendor,
};

use super::{ProcurementOrchestrator, log_events};
use crate::activity::{ActionType, ActivityLogEntry, Actor};
use crate::clock::Clock;
use crate::error::ProcurementError;
use crate::repository::ProcurementRepository;

/// How the caller names a SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkuRef {
    Id(SkuId),
    /// Case-insensitive.
    Name(String),
}

impl core::fmt::Display for SkuRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<SkuId> for SkuRef {
    fn from(id: SkuId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for SkuRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DemandSource {
    Explicit { quantity: u64 },
    Predicted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub sku: SkuRef,
    pub demand: DemandSource,
    pub preferred_vendor: Option<String>,
    pub actor: Actor,
}

impl OrderRequest {
    /// A manual order for a fixed quantity.
    pub fn explicit(sku: impl Into<SkuRef>, quantity: u64) -> Self {
        Self {
            sku: sku.into(),
            demand: DemandSource::Explicit { quantity },
            preferred_vendor: None,
            actor: Actor::User,
        }
    }

    /// A manual order sized by the predictor.
    pub fn predicted(sku: impl Into<SkuRef>) -> Self {
        Self {
            sku: sku.into(),
            demand: DemandSource::Predicted,
            preferred_vendor: None,
            actor: Actor::User,
        }
    }

    /// A replenishment order from the automatic pipeline.
    pub fn automatic(sku: impl Into<SkuRef>) -> Self {
        Self {
            actor: Actor::Ai,
            ..Self::predicted(sku)
        }
    }

    pub fn prefer(mut self, vendor: impl Into<String>) -> Self {
        self.preferred_vendor = Some(vendor.into());
        self
    }
}

/// Why an order was not placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    Constraint(ConstraintViolation),
    NoVendorsAvailable { blocked: Vec<String> },
    PreferredVendorBlocked {
        vendor: String,
        available: Vec<String>,
    },
    /// The predictor itself reported that constraints rule out any order.
    PredictorBlocked { reasoning: String },
}

impl BlockReason {
    /// Constraint name written to the audit entry.
    pub fn constraint_type(&self) -> &'static str {
        match self {
            Self::Constraint(violation) => violation.constraint_type(),
            Self::NoVendorsAvailable { .. } | Self::PreferredVendorBlocked { .. } => {
                "vendor_restriction"
            }
            Self::PredictorBlocked { .. } => "ai_detected",
        }
    }

    fn from_selection(err: DomainError) -> Result<Self, ProcurementError> {
        match err {
            DomainError::NoVendorsAvailable { blocked } => Ok(Self::NoVendorsAvailable { blocked }),
            DomainError::PreferredVendorBlocked { vendor, available } => {
                Ok(Self::PreferredVendorBlocked { vendor, available })
            }
            other => Err(other.into()),
        }
    }
}

impl core::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Constraint(violation) => write!(f, "{violation}"),
            Self::NoVendorsAvailable { blocked } if blocked.is_empty() => {
                f.write_str("No vendors found")
            }
            Self::NoVendorsAvailable { blocked } => {
                write!(f, "All vendors are blocked ({})", blocked.join(", "))
            }
            Self::PreferredVendorBlocked { vendor, available } => write!(
                f,
                "Vendor '{vendor}' is blocked. Available vendors: {}",
                available.join(", ")
            ),
            Self::PredictorBlocked { .. } => f.write_str("Unable to order due to constraints"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrderDecision {
    Placed {
        transaction: TransactionRecord,
        #[serde(default)]
        reasoning: Option<String>,
    },
    Blocked {
        sku_id: SkuId,
        sku_name: String,
        reason: BlockReason,
    },
    /// Incoming stock already covers the predicted demand.
    NoOrderNeeded {
        sku_id: SkuId,
        sku_name: String,
        predicted: u64,
        incoming: u64,
    },
}

impl OrderDecision {
    pub fn transaction(&self) -> Option<&TransactionRecord> {
        match self {
            Self::Placed { transaction, .. } => Some(transaction),
            _ => None,
        }
    }

    pub fn block_reason(&self) -> Option<&BlockReason> {
        match self {
            Self::Blocked { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed { .. })
    }
}

#[derive(Debug, Clone)]
struct PlannedLeg {
    preferred: Option<String>,
    quantity: u64,
    /// Unit cost the predictor quoted. Informational: the catalogue offer's
    /// price is what gets ordered.
    quoted_cost: Option<Decimal>,
}

/// What is about to be validated.
#[derive(Debug, Clone)]
struct Plan {
    legs: Vec<PlannedLeg>,
    mode: ValidationMode,
    estimate: Option<DemandEstimate>,
}

impl Plan {
    fn single(preferred: Option<String>, quantity: u64, mode: ValidationMode) -> Self {
        Self {
            legs: vec![PlannedLeg {
                preferred,
                quantity,
                quoted_cost: None,
            }],
            mode,
            estimate: None,
        }
    }

    /// The predictor's split, or a single leg when it proposed none.
    fn from_estimate(estimate: DemandEstimate, preferred: Option<String>) -> Self {
        let legs = if estimate.legs.is_empty() {
            vec![PlannedLeg {
                preferred,
                quantity: estimate.amount,
                quoted_cost: None,
            }]
        } else {
            estimate
                .legs
                .iter()
                .map(|leg| PlannedLeg {
                    preferred: Some(leg.vendor.clone()),
                    quantity: leg.quantity,
                    quoted_cost: leg.unit_cost,
                })
                .collect()
        };
        Self {
            legs,
            mode: ValidationMode::NoStockOffset,
            estimate: Some(estimate),
        }
    }

    fn with_estimate(mut self, estimate: DemandEstimate) -> Self {
        self.estimate = Some(estimate);
        self
    }

    fn quantity(&self) -> u64 {
        self.legs.iter().map(|l| l.quantity).sum()
    }

    fn vendor_names(&self) -> Vec<String> {
        self.legs.iter().filter_map(|l| l.preferred.clone()).collect()
    }

    fn reasoning(&self) -> Option<String> {
        self.estimate
            .as_ref()
            .map(|e| e.reasoning.clone())
            .filter(|r| !r.is_empty())
    }
}

/// Pick a vendor for every planned leg. Legs landing on the same vendor are merged.
fn resolve_legs(
    plan: &Plan,
    offers: &[VendorOffer],
    constraints: &ConstraintSet,
) -> Result<Result<Vec<LegSpec>, BlockReason>, ProcurementError> {
    let mut legs: Vec<LegSpec> = Vec::with_capacity(plan.legs.len());
    for planned in &plan.legs {
        let offer = match select_vendor(
            offers,
            constraints.blocked_vendors(),
            planned.preferred.as_deref(),
        ) {
            Ok(offer) => offer,
            Err(err) => return BlockReason::from_selection(err).map(Err),
        };
        if let Some(quoted) = planned.quoted_cost.filter(|q| *q != offer.cost_price) {
            tracing::debug!(
                vendor = %offer.vendor_name,
                quoted = %quoted,
                offer_cost = %offer.cost_price,
                "predictor quote differs from offer; ordering at offer cost"
            );
        }
        match legs.iter_mut().find(|l| l.vendor == offer.vendor_name) {
            Some(existing) => existing.quantity += planned.quantity,
            None => legs.push(LegSpec {
                vendor: offer.vendor_name.clone(),
                quantity: planned.quantity,
                unit_cost: offer.cost_price,
                delivery_days: Some(offer.delivery_time_days),
            }),
        }
    }
    Ok(Ok(legs))
}

fn order_cost(legs: &[LegSpec]) -> Result<Decimal, ProcurementError> {
    legs.iter().try_fold(Decimal::ZERO, |total, leg| {
        Decimal::from(leg.quantity)
            .checked_mul(leg.unit_cost)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| ProcurementError::invalid_input("order cost overflow"))
    })
}

impl<R, P, C> ProcurementOrchestrator<R, P, C>
where
    R: ProcurementRepository,
    P: DemandPredictor,
    C: Clock,
{
    /// Evaluate one order request and place it if every check passes.
    pub async fn place_order(
        &self,
        request: OrderRequest,
    ) -> Result<OrderDecision, ProcurementError> {
        let mut budget = self.budget_tracker().await?;
        self.evaluate_and_order(&request, &mut budget).await
    }

    /// As [`Self::place_order`], charging a placed order to `budget`.
    pub(crate) async fn evaluate_and_order(
        &self,
        request: &OrderRequest,
        budget: &mut BudgetTracker,
    ) -> Result<OrderDecision, ProcurementError> {
        let sku = self.resolve_sku(&request.sku).await?;
        let sku_id = sku.id_typed();
        let constraint_rows = self
            .repo("list_constraints", self.repository.list_constraints(sku_id))
            .await?;
        let constraints = ConstraintSet::from_stored(&constraint_rows);
        let incoming = self.incoming_for(sku_id).await?;
        let offset_by_stock = ValidationMode::OffsetByStock {
            current_stock: sku.current_units(),
        };

        let plan = match request.demand {
            DemandSource::Explicit { quantity } => {
                if quantity == 0 {
                    return Err(ProcurementError::invalid_input(
                        "order quantity must be positive",
                    ));
                }
                Plan::single(request.preferred_vendor.clone(), quantity, offset_by_stock)
            }
            DemandSource::Predicted => {
                let demand = self
                    .demand_request(&sku, &constraint_rows, incoming, budget.remaining())
                    .await?;
                let estimate = self.estimate(&demand).await?;

                if estimate.is_ai_detected_block() {
                    let reason = BlockReason::PredictorBlocked {
                        reasoning: estimate.reasoning.clone(),
                    };
                    if request.actor == Actor::Ai {
                        self.audit(
                            ActivityLogEntry::new(
                                Actor::Ai,
                                ActionType::ConstraintViolation,
                                self.clock.now(),
                            )
                            .for_sku(sku_id, sku.name())
                            .with_details(json!({
                                "violation": reason.to_string(),
                                "reasoning": estimate.reasoning,
                                "constraint_type": reason.constraint_type(),
                            })),
                        )
                        .await;
                    }
                    tracing::warn!(sku = %sku_id, "predictor reported constraints prevent ordering");
                    return Ok(OrderDecision::Blocked {
                        sku_id,
                        sku_name: sku.name().to_string(),
                        reason,
                    });
                }

                let quantity = match request.actor {
                    Actor::Ai => estimate.amount,
                    Actor::User => effective_need(estimate.amount, incoming),
                };
                if quantity == 0 {
                    tracing::info!(
                        sku = %sku_id,
                        predicted = estimate.amount,
                        incoming,
                        "no order needed"
                    );
                    return Ok(OrderDecision::NoOrderNeeded {
                        sku_id,
                        sku_name: sku.name().to_string(),
                        predicted: estimate.amount,
                        incoming,
                    });
                }

                match request.actor {
                    Actor::Ai => Plan::from_estimate(estimate, request.preferred_vendor.clone()),
                    Actor::User => {
                        Plan::single(request.preferred_vendor.clone(), quantity, offset_by_stock)
                            .with_estimate(estimate)
                    }
                }
            }
        };

        let quantity = plan.quantity();
        if let Err(violation) = constraints.validate_quantity(quantity, plan.mode) {
            return Ok(self
                .blocked(request, &sku, &plan, None, BlockReason::Constraint(violation))
                .await);
        }

        let offers = self
            .repo("list_vendor_offers", self.repository.list_vendor_offers(sku_id))
            .await?;
        let legs = match resolve_legs(&plan, &offers, &constraints)? {
            Ok(legs) => legs,
            Err(reason) => return Ok(self.blocked(request, &sku, &plan, None, reason).await),
        };

        let total_cost = order_cost(&legs)?;
        if let Err(violation) = constraints.validate_cost(total_cost, budget.remaining()) {
            return Ok(self
                .blocked(
                    request,
                    &sku,
                    &plan,
                    Some(total_cost),
                    BlockReason::Constraint(violation),
                )
                .await);
        }

        let record = self.create_transaction(&sku, legs).await?;
        budget.record_spend(record.total_cost);

        let reasoning = plan.reasoning();
        let details = match request.actor {
            Actor::Ai => json!({
                "transaction_id": record.id,
                "amount": record.total_quantity,
                "vendors": record.vendors,
                "total_cost": record.total_cost,
                "reasoning": reasoning,
            }),
            Actor::User => json!({
                "transaction_id": record.id,
                "quantity": record.total_quantity,
                "vendors": record.vendors,
                "total_cost": record.total_cost,
                "demand": request.demand,
            }),
        };
        let action = match request.actor {
            Actor::Ai => ActionType::Prediction,
            Actor::User => ActionType::Transaction,
        };
        self.audit(
            ActivityLogEntry::new(request.actor, action, record.created_at)
                .for_sku(sku_id, sku.name())
                .with_details(details),
        )
        .await;

        tracing::info!(
            sku = %sku_id,
            transaction = %record.id,
            quantity = record.total_quantity,
            total_cost = %record.total_cost,
            actor = %request.actor,
            "order placed"
        );
        Ok(OrderDecision::Placed {
            transaction: record,
            reasoning,
        })
    }

    async fn create_transaction(
        &self,
        sku: &Sku,
        legs: Vec<LegSpec>,
    ) -> Result<TransactionRecord, ProcurementError> {
        let transaction_id = TransactionId::new();
        let mut tx = PurchaseTransaction::empty(transaction_id);
        let events = tx.execute(&PurchaseTransactionCommand::CreateTransaction(
            CreateTransaction {
                transaction_id,
                sku_id: sku.id_typed(),
                sku_name: sku.name().to_string(),
                legs,
                default_lead_time_days: self.config.default_lead_time_days,
                occurred_at: self.clock.now(),
            },
        ))?;
        log_events(&events);

        let record = TransactionRecord::from(&tx);
        self.repo(
            "insert_transaction",
            self.repository.insert_transaction(&record),
        )
        .await?;
        Ok(record)
    }

    /// Record a refused order. The automatic pipeline also leaves an audit entry.
    async fn blocked(
        &self,
        request: &OrderRequest,
        sku: &Sku,
        plan: &Plan,
        total_cost: Option<Decimal>,
        reason: BlockReason,
    ) -> OrderDecision {
        tracing::warn!(
            sku = %sku.id_typed(),
            quantity = plan.quantity(),
            constraint = reason.constraint_type(),
            reason = %reason,
            "order blocked"
        );

        if request.actor == Actor::Ai {
            let predicted_amount = plan
                .estimate
                .as_ref()
                .map_or(plan.quantity(), |e| e.amount);
            self.audit(
                ActivityLogEntry::new(Actor::Ai, ActionType::ConstraintViolation, self.clock.now())
                    .for_sku(sku.id_typed(), sku.name())
                    .with_details(json!({
                        "predicted_amount": predicted_amount,
                        "total_cost": total_cost,
                        "violation": reason.to_string(),
                        "vendors": plan.vendor_names(),
                        "constraint_type": reason.constraint_type(),
                    })),
            )
            .await;
        }

        OrderDecision::Blocked {
            sku_id: sku.id_typed(),
            sku_name: sku.name().to_string(),
            reason,
        }
    }
}
