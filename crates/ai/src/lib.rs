//! `restock-ai`
//!
//! **Responsibility:** Boundary to the external language-model service.
//!
//! This crate never decides anything on its own:
//! - It describes what the predictor is asked ([`DemandRequest`]) and what it
//!   answers ([`DemandEstimate`]).
//! - It turns raw model text into those structured forms, rejecting
//!   inconsistent answers.
//! - It does not touch stock, constraints or transactions.

pub mod intent;
pub mod parse;
pub mod predictor;
pub mod scripted;

pub use intent::{ChatIntent, Intent};
pub use parse::{extract_json_object, parse_estimate, parse_intent};
pub use predictor::{DemandEstimate, DemandPredictor, DemandRequest, PredictorError, ProposedLeg};
pub use scripted::{ScriptedPredictor, ScriptedResponse};
