//! `restock-constraints`
//!
//! **Responsibility:** Per-SKU and global procurement policy.
//!
//! - Stored constraints keep their raw string value; [`Constraint`] is the
//!   parsed, typed form, produced once when a [`ConstraintSet`] is built.
//! - [`ConstraintSet::validate`] checks a proposed order in an explicit
//!   [`ValidationMode`] and reports a structured [`ConstraintViolation`].

pub mod constraint;
pub mod global;
pub mod validator;

pub use constraint::{Constraint, ConstraintKind, ConstraintParseError, StoredConstraint};
pub use global::{GlobalConstraint, GlobalConstraintKind, GlobalConstraints};
pub use validator::{ConstraintSet, ConstraintViolation, ValidationMode};
