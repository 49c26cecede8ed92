//! Per-SKU and global constraint management.

use rust_decimal::Decimal;
use serde_json::json;

use restock_ai::DemandPredictor;
use restock_constraints::{
    Constraint, ConstraintKind, GlobalConstraint, GlobalConstraintKind, StoredConstraint,
};
use restock_core::ConstraintId;

use super::{ProcurementOrchestrator, SkuRef};
use crate::activity::{ActionType, ActivityLogEntry, Actor};
use crate::clock::Clock;
use crate::error::ProcurementError;
use crate::repository::ProcurementRepository;

impl<R, P, C> ProcurementOrchestrator<R, P, C>
where
    R: ProcurementRepository,
    P: DemandPredictor,
    C: Clock,
{
    /// Attach a constraint to a SKU. The raw value is checked against its
    /// kind before it is stored (as a string).
    pub async fn add_sku_constraint(
        &self,
        sku: SkuRef,
        constraint_type: &str,
        constraint_value: &str,
        description: Option<String>,
    ) -> Result<StoredConstraint, ProcurementError> {
        let sku = self.resolve_sku(&sku).await?;
        let kind: ConstraintKind = constraint_type
            .parse()
            .map_err(|e| ProcurementError::invalid_input(format!("{e}")))?;
        Constraint::parse(kind, constraint_value)
            .map_err(|e| ProcurementError::invalid_input(format!("{e}")))?;

        let stored = StoredConstraint {
            id: ConstraintId::new(),
            sku_id: sku.id_typed(),
            constraint_type: kind.as_str().to_string(),
            constraint_value: constraint_value.trim().to_string(),
            description,
            created_at: self.clock.now(),
        };
        self.repo("add_constraint", self.repository.add_constraint(&stored))
            .await?;

        self.audit(
            ActivityLogEntry::new(Actor::User, ActionType::ConstraintAdded, stored.created_at)
                .for_sku(sku.id_typed(), sku.name())
                .with_details(json!({
                    "constraint_type": stored.constraint_type,
                    "constraint_value": stored.constraint_value,
                })),
        )
        .await;
        tracing::info!(
            sku = %sku.id_typed(),
            constraint = %stored.id,
            kind = %kind,
            "constraint added"
        );
        Ok(stored)
    }

    /// Returns whether a constraint was removed.
    pub async fn remove_sku_constraint(&self, id: ConstraintId) -> Result<bool, ProcurementError> {
        let removed = self
            .repo("delete_constraint", self.repository.delete_constraint(id))
            .await?;
        tracing::info!(constraint = %id, removed, "constraint removal requested");
        Ok(removed)
    }

    /// Set (or replace) the global monthly budget.
    pub async fn set_monthly_budget(
        &self,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<GlobalConstraint, ProcurementError> {
        if amount.is_sign_negative() {
            return Err(ProcurementError::invalid_input(
                "monthly budget cannot be negative",
            ));
        }
        let row = GlobalConstraint {
            constraint_type: GlobalConstraintKind::MonthlyBudget,
            constraint_value: amount.normalize().to_string(),
            description,
            updated_at: self.clock.now(),
        };
        self.repo(
            "upsert_global_constraint",
            self.repository.upsert_global_constraint(&row),
        )
        .await?;

        self.audit(
            ActivityLogEntry::new(Actor::User, ActionType::GlobalConstraintUpdated, row.updated_at)
                .with_details(json!({
                    "constraint_type": row.constraint_type,
                    "constraint_value": row.constraint_value,
                })),
        )
        .await;
        tracing::info!(monthly_budget = %row.constraint_value, "monthly budget set");
        Ok(row)
    }

    /// Remove the global monthly budget. Returns whether one was set.
    pub async fn clear_monthly_budget(&self) -> Result<bool, ProcurementError> {
        let removed = self
            .repo(
                "delete_global_constraint",
                self.repository
                    .delete_global_constraint(GlobalConstraintKind::MonthlyBudget),
            )
            .await?;
        if removed {
            self.audit(
                ActivityLogEntry::new(
                    Actor::User,
                    ActionType::GlobalConstraintDeleted,
                    self.clock.now(),
                )
                .with_details(json!({ "constraint_type": GlobalConstraintKind::MonthlyBudget })),
            )
            .await;
            tracing::info!("monthly budget cleared");
        }
        Ok(removed)
    }
}
