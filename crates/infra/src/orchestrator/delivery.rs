//! Receiving deliveries.
//!
//! A delivery is two writes: the transaction row (leg statuses) and the SKU
//! row (stock). The leg is claimed first with a versioned write; only the
//! caller that wins the claim credits stock. A repeated or concurrent
//! delivery of the same leg therefore fails with `AlreadyDelivered` (or is a
//! no-op in the sweep) and never credits stock twice.
//!
//! If the stock credit fails after a successful claim, the claimed legs are
//! released back to pending so the delivery can be retried.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use restock_ai::DemandPredictor;
use restock_core::{Aggregate, AggregateRoot, ExpectedVersion, SkuId, TransactionId};
use restock_inventory::{ReceiveStock, SkuCommand};
use restock_purchasing::{
    CancelTransaction, DeliverLeg, DeliverPending, DeliveryTrigger, LegsDelivered,
    PurchaseTransaction, PurchaseTransactionCommand, PurchaseTransactionEvent, ReleaseLegs,
    TransactionRecord, TransactionStatus,
};

use super::{ProcurementOrchestrator, log_events};
use crate::activity::{ActionType, ActivityLogEntry, Actor};
use crate::clock::Clock;
use crate::error::ProcurementError;
use crate::repository::ProcurementRepository;

/// One leg delivered by the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweptLeg {
    pub transaction_id: TransactionId,
    pub sku_id: SkuId,
    pub sku_name: String,
    pub leg: usize,
    pub vendor: String,
    pub quantity_added: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub transaction_id: TransactionId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySweepReport {
    pub delivered: Vec<SweptLeg>,
    pub failures: Vec<SweepFailure>,
    /// Active transactions not yet due.
    pub not_due: usize,
}

impl DeliverySweepReport {
    pub fn processed_count(&self) -> usize {
        self.delivered.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryReadiness {
    /// Expected date is today or earlier.
    Ready,
    Pending,
}

/// An active transaction as shown by `check_deliveries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub transaction_id: TransactionId,
    pub sku_id: SkuId,
    pub sku_name: String,
    pub vendors: Vec<String>,
    pub undelivered_units: u64,
    pub status: TransactionStatus,
    pub expected_delivery_date: NaiveDate,
    pub readiness: DeliveryReadiness,
}

impl<R, P, C> ProcurementOrchestrator<R, P, C>
where
    R: ProcurementRepository,
    P: DemandPredictor,
    C: Clock,
{
    /// Manually mark one leg delivered and credit its quantity to stock.
    pub async fn deliver_leg(
        &self,
        transaction_id: TransactionId,
        leg: usize,
    ) -> Result<TransactionRecord, ProcurementError> {
        let (tx, delivered) = self
            .claim(transaction_id, |now| {
                PurchaseTransactionCommand::DeliverLeg(DeliverLeg {
                    transaction_id,
                    leg,
                    trigger: DeliveryTrigger::Manual,
                    occurred_at: now,
                })
            })
            .await?;

        for event in &delivered {
            self.receive(&tx, event, Actor::User).await?;
        }
        Ok(TransactionRecord::from(&tx))
    }

    /// Deliver every pending leg of each active transaction that is due.
    ///
    /// Transactions are independent: one failing is reported and the sweep
    /// moves on.
    pub async fn process_deliveries(&self) -> Result<DeliverySweepReport, ProcurementError> {
        let today = self.clock.today();
        let active = self.active_transactions(None).await?;
        let mut report = DeliverySweepReport::default();

        for tx in active {
            if !tx.is_due(today) {
                report.not_due += 1;
                continue;
            }
            let transaction_id = tx.id_typed();
            match self.deliver_due(transaction_id).await {
                Ok(legs) => report.delivered.extend(legs),
                Err(err) => {
                    tracing::warn!(
                        transaction = %transaction_id,
                        error = %err,
                        "delivery sweep failed for transaction"
                    );
                    report.failures.push(SweepFailure {
                        transaction_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            delivered = report.delivered.len(),
            failures = report.failures.len(),
            not_due = report.not_due,
            "delivery sweep complete"
        );
        Ok(report)
    }

    /// Active transactions with their readiness as of today. Read-only.
    pub async fn check_deliveries(&self) -> Result<Vec<DeliveryLine>, ProcurementError> {
        let today = self.clock.today();
        let lines = self
            .active_transactions(None)
            .await?
            .iter()
            .map(|tx| DeliveryLine {
                transaction_id: tx.id_typed(),
                sku_id: tx.sku_id(),
                sku_name: tx.sku_name().to_string(),
                vendors: tx.legs().iter().map(|l| l.vendor.clone()).collect(),
                undelivered_units: tx.undelivered_units(),
                status: tx.status(),
                expected_delivery_date: tx.expected_delivery_date(),
                readiness: if tx.expected_delivery_date() <= today {
                    DeliveryReadiness::Ready
                } else {
                    DeliveryReadiness::Pending
                },
            })
            .collect();
        Ok(lines)
    }

    /// Cancel a transaction that is still expecting deliveries.
    pub async fn cancel(
        &self,
        transaction_id: TransactionId,
    ) -> Result<TransactionRecord, ProcurementError> {
        let mut attempt = 0;
        let tx = loop {
            let mut tx = self.load_transaction(transaction_id).await?;
            let read_version = tx.version();
            let events = tx.execute(&PurchaseTransactionCommand::CancelTransaction(
                CancelTransaction {
                    transaction_id,
                    occurred_at: self.clock.now(),
                },
            ))?;
            log_events(&events);
            let record = TransactionRecord::from(&tx);
            match self
                .repo(
                    "update_transaction_legs",
                    self.repository
                        .update_transaction_legs(&record, ExpectedVersion::Exact(read_version)),
                )
                .await
            {
                Ok(()) => break tx,
                Err(err) if err.is_conflict() && self.retries_left(attempt) => {
                    attempt += 1;
                    tracing::debug!(transaction = %transaction_id, attempt, "cancel conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        };

        self.audit(
            ActivityLogEntry::new(Actor::User, ActionType::Cancellation, self.clock.now())
                .for_sku(tx.sku_id(), tx.sku_name())
                .with_details(json!({
                    "transaction_id": transaction_id,
                    "undelivered_units": tx.undelivered_units(),
                })),
        )
        .await;
        tracing::info!(transaction = %transaction_id, "transaction cancelled");
        Ok(TransactionRecord::from(&tx))
    }

    async fn deliver_due(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<SweptLeg>, ProcurementError> {
        let (tx, delivered) = self
            .claim(transaction_id, |now| {
                PurchaseTransactionCommand::DeliverPending(DeliverPending {
                    transaction_id,
                    trigger: DeliveryTrigger::Auto,
                    occurred_at: now,
                })
            })
            .await?;

        let mut swept = Vec::new();
        for event in &delivered {
            self.receive(&tx, event, Actor::Ai).await?;
            swept.extend(event.legs.iter().map(|leg| SweptLeg {
                transaction_id,
                sku_id: tx.sku_id(),
                sku_name: tx.sku_name().to_string(),
                leg: leg.leg,
                vendor: leg.vendor.clone(),
                quantity_added: leg.quantity,
            }));
        }
        Ok(swept)
    }

    /// Apply a delivery command and persist the new leg statuses with a
    /// versioned write. Returns the updated aggregate and what was delivered
    /// (nothing when no leg was pending).
    async fn claim(
        &self,
        transaction_id: TransactionId,
        command: impl Fn(DateTime<Utc>) -> PurchaseTransactionCommand,
    ) -> Result<(PurchaseTransaction, Vec<LegsDelivered>), ProcurementError> {
        let mut attempt = 0;
        loop {
            let mut tx = self.load_transaction(transaction_id).await?;
            let read_version = tx.version();
            let events = tx.execute(&command(self.clock.now()))?;
            log_events(&events);
            let delivered: Vec<LegsDelivered> = events
                .into_iter()
                .filter_map(|e| match e {
                    PurchaseTransactionEvent::LegsDelivered(d) => Some(d),
                    _ => None,
                })
                .collect();
            if delivered.is_empty() {
                return Ok((tx, delivered));
            }

            let record = TransactionRecord::from(&tx);
            match self
                .repo(
                    "update_transaction_legs",
                    self.repository
                        .update_transaction_legs(&record, ExpectedVersion::Exact(read_version)),
                )
                .await
            {
                Ok(()) => return Ok((tx, delivered)),
                Err(err) if err.is_conflict() && self.retries_left(attempt) => {
                    attempt += 1;
                    tracing::debug!(transaction = %transaction_id, attempt, "delivery conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Credit claimed legs to stock and audit each one.
    async fn receive(
        &self,
        tx: &PurchaseTransaction,
        delivered: &LegsDelivered,
        actor: Actor,
    ) -> Result<(), ProcurementError> {
        if let Err(err) = self
            .credit_stock(tx.sku_id(), delivered.quantity(), delivered.occurred_at)
            .await
        {
            tracing::warn!(
                transaction = %delivered.transaction_id,
                sku = %tx.sku_id(),
                quantity = delivered.quantity(),
                error = %err,
                "stock credit failed, releasing claimed legs"
            );
            let legs: Vec<usize> = delivered.legs.iter().map(|l| l.leg).collect();
            if let Err(release_err) = self.release(delivered.transaction_id, legs).await {
                tracing::error!(
                    transaction = %delivered.transaction_id,
                    sku = %tx.sku_id(),
                    quantity = delivered.quantity(),
                    error = %release_err,
                    "legs marked delivered but stock was not credited"
                );
            }
            return Err(err);
        }

        for leg in &delivered.legs {
            self.audit(
                ActivityLogEntry::new(actor, ActionType::Delivery, delivered.occurred_at)
                    .for_sku(tx.sku_id(), tx.sku_name())
                    .with_details(json!({
                        "transaction_id": delivered.transaction_id,
                        "vendor": leg.vendor,
                        "quantity_added": leg.quantity,
                        "trigger": delivered.trigger,
                    })),
            )
            .await;
        }
        tracing::info!(
            transaction = %delivered.transaction_id,
            sku = %tx.sku_id(),
            quantity = delivered.quantity(),
            trigger = %delivered.trigger,
            status = %delivered.status_after,
            "delivery received"
        );
        Ok(())
    }

    /// Put claimed legs back to pending. Versioned write with conflict retry,
    /// like `cancel`.
    async fn release(
        &self,
        transaction_id: TransactionId,
        legs: Vec<usize>,
    ) -> Result<(), ProcurementError> {
        let mut attempt = 0;
        loop {
            let mut tx = self.load_transaction(transaction_id).await?;
            let read_version = tx.version();
            let events = tx.execute(&PurchaseTransactionCommand::ReleaseLegs(ReleaseLegs {
                transaction_id,
                legs: legs.clone(),
                occurred_at: self.clock.now(),
            }))?;
            log_events(&events);

            let record = TransactionRecord::from(&tx);
            match self
                .repo(
                    "update_transaction_legs",
                    self.repository
                        .update_transaction_legs(&record, ExpectedVersion::Exact(read_version)),
                )
                .await
            {
                Ok(()) => {
                    tracing::info!(transaction = %transaction_id, legs = ?legs, status = %tx.status(), "claimed legs released");
                    return Ok(());
                }
                Err(err) if err.is_conflict() && self.retries_left(attempt) => {
                    attempt += 1;
                    tracing::debug!(transaction = %transaction_id, attempt, "release conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn credit_stock(
        &self,
        sku_id: SkuId,
        quantity: u64,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), ProcurementError> {
        let mut attempt = 0;
        loop {
            let mut sku = self.get_sku(sku_id).await?;
            let read_version = sku.version();
            let events = sku.execute(&SkuCommand::ReceiveStock(ReceiveStock {
                sku_id,
                quantity,
                occurred_at,
            }))?;
            log_events(&events);
            match self
                .repo(
                    "update_sku_stock",
                    self.repository
                        .update_sku_stock(&sku, ExpectedVersion::Exact(read_version)),
                )
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) if err.is_conflict() && self.retries_left(attempt) => {
                    attempt += 1;
                    tracing::debug!(sku = %sku_id, attempt, "stock conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}
