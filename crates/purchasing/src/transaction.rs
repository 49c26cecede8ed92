use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use restock_core::{Aggregate, AggregateRoot, DomainError, Event, SkuId, TransactionId};

/// Status of one vendor leg. `pending -> delivered`, reversed only by a
/// compensating release when the stock credit for a delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    Pending,
    Delivered,
}

/// Overall transaction status.
///
/// Derived from leg statuses except for `Cancelled` (set explicitly) and
/// `Completed` (only ever loaded from storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    InTransit,
    PartiallyDelivered,
    Delivered,
    Cancelled,
    Completed,
}

impl TransactionStatus {
    /// Still expecting deliveries.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Delivered | Self::Cancelled | Self::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InTransit => "in_transit",
            Self::PartiallyDelivered => "partially_delivered",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl core::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_transit" => Ok(Self::InTransit),
            "partially_delivered" => Ok(Self::PartiallyDelivered),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(DomainError::validation(format!(
                "unknown transaction status '{other}'"
            ))),
        }
    }
}

/// What caused a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTrigger {
    Manual,
    Auto,
}

impl core::fmt::Display for DeliveryTrigger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// A vendor leg as requested at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegSpec {
    pub vendor: String,
    pub quantity: u64,
    pub unit_cost: Decimal,
    /// Lead time; `None` when the order was entered without delivery data.
    pub delivery_days: Option<u32>,
}

/// One vendor's portion of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorLeg {
    pub vendor: String,
    pub quantity: u64,
    pub unit_cost: Decimal,
    pub delivery_days: Option<u32>,
    pub status: LegStatus,
}

impl VendorLeg {
    pub fn line_cost(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_cost
    }

    pub fn is_delivered(&self) -> bool {
        self.status == LegStatus::Delivered
    }
}

/// Aggregate root: PurchaseTransaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseTransaction {
    pub(crate) id: TransactionId,
    pub(crate) sku_id: SkuId,
    pub(crate) sku_name: String,
    pub(crate) legs: Vec<VendorLeg>,
    pub(crate) total_cost: Decimal,
    pub(crate) status: TransactionStatus,
    pub(crate) expected_delivery_date: NaiveDate,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) version: u64,
    pub(crate) created: bool,
}

impl PurchaseTransaction {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: TransactionId) -> Self {
        Self {
            id,
            sku_id: SkuId::from_uuid(Uuid::nil()),
            sku_name: String::new(),
            legs: Vec::new(),
            total_cost: Decimal::ZERO,
            status: TransactionStatus::Pending,
            expected_delivery_date: NaiveDate::MIN,
            created_at: DateTime::<Utc>::MIN_UTC,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn sku_id(&self) -> SkuId {
        self.sku_id
    }

    pub fn sku_name(&self) -> &str {
        &self.sku_name
    }

    pub fn legs(&self) -> &[VendorLeg] {
        &self.legs
    }

    pub fn total_quantity(&self) -> u64 {
        self.legs.iter().map(|l| l.quantity).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn expected_delivery_date(&self) -> NaiveDate {
        self.expected_delivery_date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Units ordered but not yet delivered.
    pub fn undelivered_units(&self) -> u64 {
        self.legs
            .iter()
            .filter(|l| !l.is_delivered())
            .map(|l| l.quantity)
            .sum()
    }

    /// Active and due on or before `today`.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status.is_active() && self.expected_delivery_date <= today
    }
}

impl AggregateRoot for PurchaseTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Overall status implied by the leg statuses.
///
/// `undelivered` is returned while no leg has been delivered (`pending` or
/// `in_transit`, fixed at creation).
pub(crate) fn derive_status(
    legs: &[VendorLeg],
    undelivered: TransactionStatus,
) -> TransactionStatus {
    let delivered = legs.iter().filter(|l| l.is_delivered()).count();
    if !legs.is_empty() && delivered == legs.len() {
        TransactionStatus::Delivered
    } else if delivered > 0 {
        TransactionStatus::PartiallyDelivered
    } else {
        undelivered
    }
}

/// Status of a transaction none of whose legs has arrived yet.
fn undelivered_status(legs: &[VendorLeg]) -> TransactionStatus {
    if legs.iter().any(|l| l.delivery_days.is_some()) {
        TransactionStatus::InTransit
    } else {
        TransactionStatus::Pending
    }
}

/// Command: CreateTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub transaction_id: TransactionId,
    pub sku_id: SkuId,
    pub sku_name: String,
    pub legs: Vec<LegSpec>,
    /// Lead time assumed for legs without delivery data.
    pub default_lead_time_days: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeliverLeg (a single leg, by index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverLeg {
    pub transaction_id: TransactionId,
    pub leg: usize,
    pub trigger: DeliveryTrigger,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeliverPending (every leg still pending, one status recompute).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverPending {
    pub transaction_id: TransactionId,
    pub trigger: DeliveryTrigger,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseLegs (undo a delivery whose stock credit never landed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLegs {
    pub transaction_id: TransactionId,
    pub legs: Vec<usize>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransaction {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseTransactionCommand {
    CreateTransaction(CreateTransaction),
    DeliverLeg(DeliverLeg),
    DeliverPending(DeliverPending),
    ReleaseLegs(ReleaseLegs),
    CancelTransaction(CancelTransaction),
}

/// Event: TransactionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCreated {
    pub transaction_id: TransactionId,
    pub sku_id: SkuId,
    pub sku_name: String,
    pub legs: Vec<VendorLeg>,
    pub total_cost: Decimal,
    pub status: TransactionStatus,
    pub expected_delivery_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredLeg {
    pub leg: usize,
    pub vendor: String,
    pub quantity: u64,
}

/// Event: LegsDelivered.
///
/// Carries the quantities that must be credited to the SKU's on-hand stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegsDelivered {
    pub transaction_id: TransactionId,
    pub sku_id: SkuId,
    pub legs: Vec<DeliveredLeg>,
    pub trigger: DeliveryTrigger,
    pub status_after: TransactionStatus,
    pub occurred_at: DateTime<Utc>,
}

impl LegsDelivered {
    pub fn quantity(&self) -> u64 {
        self.legs.iter().map(|l| l.quantity).sum()
    }
}

/// Event: LegsReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegsReleased {
    pub transaction_id: TransactionId,
    pub sku_id: SkuId,
    pub legs: Vec<usize>,
    pub status_after: TransactionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransactionCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCancelled {
    pub transaction_id: TransactionId,
    pub sku_id: SkuId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseTransactionEvent {
    TransactionCreated(TransactionCreated),
    LegsDelivered(LegsDelivered),
    LegsReleased(LegsReleased),
    TransactionCancelled(TransactionCancelled),
}

impl Event for PurchaseTransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseTransactionEvent::TransactionCreated(_) => "purchasing.transaction.created",
            PurchaseTransactionEvent::LegsDelivered(_) => "purchasing.transaction.legs_delivered",
            PurchaseTransactionEvent::LegsReleased(_) => "purchasing.transaction.legs_released",
            PurchaseTransactionEvent::TransactionCancelled(_) => {
                "purchasing.transaction.cancelled"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseTransactionEvent::TransactionCreated(e) => e.occurred_at,
            PurchaseTransactionEvent::LegsDelivered(e) => e.occurred_at,
            PurchaseTransactionEvent::LegsReleased(e) => e.occurred_at,
            PurchaseTransactionEvent::TransactionCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseTransaction {
    type Command = PurchaseTransactionCommand;
    type Event = PurchaseTransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseTransactionEvent::TransactionCreated(e) => {
                self.id = e.transaction_id;
                self.sku_id = e.sku_id;
                self.sku_name = e.sku_name.clone();
                self.legs = e.legs.clone();
                self.total_cost = e.total_cost;
                self.status = e.status;
                self.expected_delivery_date = e.expected_delivery_date;
                self.created_at = e.occurred_at;
                self.created = true;
            }
            PurchaseTransactionEvent::LegsDelivered(e) => {
                for delivered in &e.legs {
                    if let Some(leg) = self.legs.get_mut(delivered.leg) {
                        leg.status = LegStatus::Delivered;
                    }
                }
                self.status = e.status_after;
            }
            PurchaseTransactionEvent::LegsReleased(e) => {
                for idx in &e.legs {
                    if let Some(leg) = self.legs.get_mut(*idx) {
                        leg.status = LegStatus::Pending;
                    }
                }
                self.status = e.status_after;
            }
            PurchaseTransactionEvent::TransactionCancelled(_) => {
                self.status = TransactionStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseTransactionCommand::CreateTransaction(cmd) => self.handle_create(cmd),
            PurchaseTransactionCommand::DeliverLeg(cmd) => self.handle_deliver_leg(cmd),
            PurchaseTransactionCommand::DeliverPending(cmd) => self.handle_deliver_pending(cmd),
            PurchaseTransactionCommand::ReleaseLegs(cmd) => self.handle_release(cmd),
            PurchaseTransactionCommand::CancelTransaction(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseTransaction {
    fn ensure_transaction_id(&self, transaction_id: TransactionId) -> Result<(), DomainError> {
        if self.id != transaction_id {
            return Err(DomainError::invariant("transaction_id mismatch"));
        }
        Ok(())
    }

    fn ensure_deliverable(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("transaction"));
        }
        match self.status {
            TransactionStatus::Cancelled | TransactionStatus::Completed => {
                Err(DomainError::invariant(format!(
                    "cannot deliver a {} transaction",
                    self.status
                )))
            }
            _ => Ok(()),
        }
    }

    fn handle_create(
        &self,
        cmd: &CreateTransaction,
    ) -> Result<Vec<PurchaseTransactionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transaction already exists"));
        }
        if cmd.legs.is_empty() {
            return Err(DomainError::validation(
                "transaction needs at least one vendor leg",
            ));
        }

        let has_delivery_data = cmd.legs.iter().any(|l| l.delivery_days.is_some());
        let mut legs = Vec::with_capacity(cmd.legs.len());
        let mut total_cost = Decimal::ZERO;
        for (idx, spec) in cmd.legs.iter().enumerate() {
            if spec.vendor.trim().is_empty() {
                return Err(DomainError::validation(format!("leg {idx}: vendor is empty")));
            }
            if spec.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "leg {idx}: quantity must be positive"
                )));
            }
            if spec.unit_cost.is_sign_negative() {
                return Err(DomainError::validation(format!(
                    "leg {idx}: unit cost cannot be negative"
                )));
            }
            let leg = VendorLeg {
                vendor: spec.vendor.trim().to_string(),
                quantity: spec.quantity,
                unit_cost: spec.unit_cost,
                // Either every leg has a lead time or none does.
                delivery_days: has_delivery_data
                    .then(|| spec.delivery_days.unwrap_or(cmd.default_lead_time_days)),
                status: LegStatus::Pending,
            };
            total_cost = Decimal::from(leg.quantity)
                .checked_mul(leg.unit_cost)
                .and_then(|line| total_cost.checked_add(line))
                .ok_or_else(|| DomainError::validation("total cost overflow"))?;
            legs.push(leg);
        }

        let lead_time = legs
            .iter()
            .map(|l| l.delivery_days.unwrap_or(cmd.default_lead_time_days))
            .max()
            .unwrap_or(cmd.default_lead_time_days);
        let expected_delivery_date = cmd
            .occurred_at
            .date_naive()
            .checked_add_days(Days::new(u64::from(lead_time)))
            .ok_or_else(|| DomainError::validation("expected delivery date out of range"))?;

        let status = undelivered_status(&legs);

        Ok(vec![PurchaseTransactionEvent::TransactionCreated(
            TransactionCreated {
                transaction_id: cmd.transaction_id,
                sku_id: cmd.sku_id,
                sku_name: cmd.sku_name.clone(),
                legs,
                total_cost,
                status,
                expected_delivery_date,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_deliver_leg(
        &self,
        cmd: &DeliverLeg,
    ) -> Result<Vec<PurchaseTransactionEvent>, DomainError> {
        self.ensure_deliverable()?;
        self.ensure_transaction_id(cmd.transaction_id)?;

        let leg = self
            .legs
            .get(cmd.leg)
            .ok_or_else(|| DomainError::not_found(format!("leg {}", cmd.leg)))?;
        if leg.is_delivered() {
            return Err(DomainError::AlreadyDelivered { leg: cmd.leg });
        }

        self.delivered_event(vec![cmd.leg], cmd.trigger, cmd.occurred_at)
    }

    fn handle_deliver_pending(
        &self,
        cmd: &DeliverPending,
    ) -> Result<Vec<PurchaseTransactionEvent>, DomainError> {
        self.ensure_deliverable()?;
        self.ensure_transaction_id(cmd.transaction_id)?;

        let pending: Vec<usize> = self
            .legs
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.is_delivered())
            .map(|(idx, _)| idx)
            .collect();
        if pending.is_empty() {
            return Ok(vec![]);
        }

        self.delivered_event(pending, cmd.trigger, cmd.occurred_at)
    }

    fn delivered_event(
        &self,
        indices: Vec<usize>,
        trigger: DeliveryTrigger,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<PurchaseTransactionEvent>, DomainError> {
        let mut after = self.legs.clone();
        let mut delivered = Vec::with_capacity(indices.len());
        for idx in indices {
            let leg = &mut after[idx];
            leg.status = LegStatus::Delivered;
            delivered.push(DeliveredLeg {
                leg: idx,
                vendor: leg.vendor.clone(),
                quantity: leg.quantity,
            });
        }

        Ok(vec![PurchaseTransactionEvent::LegsDelivered(LegsDelivered {
            transaction_id: self.id,
            sku_id: self.sku_id,
            legs: delivered,
            trigger,
            status_after: derive_status(&after, self.status),
            occurred_at,
        })])
    }

    fn handle_release(
        &self,
        cmd: &ReleaseLegs,
    ) -> Result<Vec<PurchaseTransactionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("transaction"));
        }
        self.ensure_transaction_id(cmd.transaction_id)?;
        if cmd.legs.is_empty() {
            return Ok(vec![]);
        }

        let mut after = self.legs.clone();
        for &idx in &cmd.legs {
            let leg = after
                .get_mut(idx)
                .ok_or_else(|| DomainError::not_found(format!("leg {idx}")))?;
            if !leg.is_delivered() {
                return Err(DomainError::invariant(format!(
                    "leg {idx} is not delivered"
                )));
            }
            leg.status = LegStatus::Pending;
        }

        // A cancel that landed in between keeps the transaction cancelled.
        let status_after = match self.status {
            TransactionStatus::Cancelled | TransactionStatus::Completed => self.status,
            _ => derive_status(&after, undelivered_status(&after)),
        };

        Ok(vec![PurchaseTransactionEvent::LegsReleased(LegsReleased {
            transaction_id: self.id,
            sku_id: self.sku_id,
            legs: cmd.legs.clone(),
            status_after,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelTransaction,
    ) -> Result<Vec<PurchaseTransactionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("transaction"));
        }
        self.ensure_transaction_id(cmd.transaction_id)?;

        if !self.status.is_active() {
            return Err(DomainError::invariant(format!(
                "cannot cancel a {} transaction",
                self.status
            )));
        }

        Ok(vec![PurchaseTransactionEvent::TransactionCancelled(
            TransactionCancelled {
                transaction_id: cmd.transaction_id,
                sku_id: self.sku_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
