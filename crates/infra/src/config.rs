//! Procurement runtime configuration.
//!
//! Values come from `RESTOCK_*` environment variables. Anything missing or
//! unparseable falls back to the default (with a warning for the latter).

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use restock_purchasing::SpendPolicy;

pub const REPOSITORY_TIMEOUT_ENV: &str = "RESTOCK_REPOSITORY_TIMEOUT_MS";
pub const PREDICTOR_TIMEOUT_ENV: &str = "RESTOCK_PREDICTOR_TIMEOUT_MS";
pub const DEFAULT_LEAD_TIME_ENV: &str = "RESTOCK_DEFAULT_LEAD_TIME_DAYS";
pub const SPEND_POLICY_ENV: &str = "RESTOCK_SPEND_POLICY";
pub const MAX_CONFLICT_RETRIES_ENV: &str = "RESTOCK_MAX_CONFLICT_RETRIES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcurementConfig {
    pub repository_timeout_ms: u64,
    pub predictor_timeout_ms: u64,
    /// Lead time for vendors without delivery data.
    pub default_lead_time_days: u32,
    pub spend_policy: SpendPolicy,
    /// Reload-and-retry attempts after a stale write.
    pub max_conflict_retries: u32,
}

impl Default for ProcurementConfig {
    fn default() -> Self {
        Self {
            repository_timeout_ms: 5_000,
            predictor_timeout_ms: 30_000,
            default_lead_time_days: 5,
            spend_policy: SpendPolicy::default(),
            max_conflict_retries: 3,
        }
    }
}

impl ProcurementConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            repository_timeout_ms: read(
                &lookup,
                REPOSITORY_TIMEOUT_ENV,
                defaults.repository_timeout_ms,
            ),
            predictor_timeout_ms: read(
                &lookup,
                PREDICTOR_TIMEOUT_ENV,
                defaults.predictor_timeout_ms,
            ),
            default_lead_time_days: read(
                &lookup,
                DEFAULT_LEAD_TIME_ENV,
                defaults.default_lead_time_days,
            ),
            spend_policy: read(&lookup, SPEND_POLICY_ENV, defaults.spend_policy),
            max_conflict_retries: read(
                &lookup,
                MAX_CONFLICT_RETRIES_ENV,
                defaults.max_conflict_retries,
            ),
        }
    }

    pub fn repository_timeout(&self) -> Duration {
        Duration::from_millis(self.repository_timeout_ms)
    }

    pub fn predictor_timeout(&self) -> Duration {
        Duration::from_millis(self.predictor_timeout_ms)
    }
}

fn read<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparseable config value");
                default
            }
        },
    }
}
