//! Infrastructure layer: persistence boundary, configuration, clock and the
//! procurement workflows that compose the domain crates.

pub mod activity;
pub mod clock;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod repository;

pub use activity::{ActionType, ActivityFilter, ActivityLogEntry, Actor};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ProcurementConfig;
pub use error::{ProcurementError, RepositoryError, Upstream};
pub use orchestrator::{
    BlockReason, DeliveryLine, DeliveryReadiness, DeliverySweepReport, DemandSource,
    IntentOutcome, OrderDecision, OrderRequest, ProcurementOrchestrator, ReplenishmentReport,
    SkuOutcome, SkuRef, StockAssessment, StockVerdict, SweepFailure, SweptLeg,
};
pub use repository::{InMemoryRepository, ProcurementRepository, Snapshot};

#[cfg(test)]
mod integration_tests;
