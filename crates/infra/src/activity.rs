//! Audit trail of procurement decisions.
//!
//! Separate from tracing: entries are persisted through the repository and
//! are part of the observable behaviour (who ordered what, which orders were
//! refused and why).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use restock_core::SkuId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User,
    Ai,
}

impl core::fmt::Display for Actor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Ai => f.write_str("ai"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Prediction,
    Transaction,
    Delivery,
    ConstraintViolation,
    Sale,
    Cancellation,
    ConstraintAdded,
    GlobalConstraintUpdated,
    GlobalConstraintDeleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub actor: Actor,
    pub action_type: ActionType,
    #[serde(default)]
    pub sku_id: Option<SkuId>,
    #[serde(default)]
    pub sku_name: Option<String>,
    #[serde(default)]
    pub details: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(actor: Actor, action_type: ActionType, timestamp: DateTime<Utc>) -> Self {
        Self {
            actor,
            action_type,
            sku_id: None,
            sku_name: None,
            details: None,
            timestamp,
        }
    }

    pub fn for_sku(mut self, sku_id: SkuId, sku_name: impl Into<String>) -> Self {
        self.sku_id = Some(sku_id);
        self.sku_name = Some(sku_name.into());
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    /// A string field of `details`, if present.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.as_ref()?.get(key)?.as_str()
    }
}

/// Listing filter. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub actor: Option<Actor>,
    pub action_type: Option<ActionType>,
    pub limit: Option<usize>,
}

impl ActivityFilter {
    pub fn action(action_type: ActionType) -> Self {
        Self {
            action_type: Some(action_type),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &ActivityLogEntry) -> bool {
        self.actor.is_none_or(|a| a == entry.actor)
            && self.action_type.is_none_or(|t| t == entry.action_type)
    }
}
