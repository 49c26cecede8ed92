//! Domain building blocks shared by every restock crate.
//!
//! This crate contains **pure domain** primitives shared by the inventory,
//! constraint and purchasing modules (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod event;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::DomainError;
pub use event::Event;
pub use id::{ConstraintId, SkuId, TransactionId};
