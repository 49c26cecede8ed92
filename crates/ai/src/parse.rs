//! Decoding of raw model output.
//!
//! Model replies are free text that should contain one JSON object. The
//! object is located as the span from the first `{` to the last `}` and
//! decoded leniently (missing fields default, integral floats are accepted);
//! inconsistent content is rejected as `InvalidInput`.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::intent::{ChatIntent, Intent};
use crate::predictor::{DemandEstimate, PredictorError, ProposedLeg};

/// The outermost `{...}` span of `raw`, if any.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

#[derive(Debug, Deserialize)]
struct RawEstimate {
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    vendors: Vec<String>,
    #[serde(default)]
    quantities: Vec<f64>,
    #[serde(default, alias = "unit_costs")]
    cost: Vec<Decimal>,
    #[serde(default)]
    constraint_blocked: bool,
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    quantity: Option<f64>,
    #[serde(default)]
    vendor: Option<String>,
    #[serde(default)]
    response_text: Option<String>,
}

fn decode<'a, T: Deserialize<'a>>(raw: &'a str) -> Result<T, PredictorError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| PredictorError::Unparseable("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| PredictorError::Unparseable(e.to_string()))
}

fn to_units(value: f64, field: &str) -> Result<u64, PredictorError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(PredictorError::InvalidInput(format!(
            "{field} must be a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u64)
}

/// Parse a demand estimate from raw model text.
pub fn parse_estimate(raw: &str) -> Result<DemandEstimate, PredictorError> {
    let parsed: RawEstimate = decode(raw)?;

    let amount = to_units(parsed.amount.unwrap_or(0.0), "amount")?;
    if parsed.vendors.len() != parsed.quantities.len() {
        return Err(PredictorError::InvalidInput(format!(
            "{} vendors but {} quantities",
            parsed.vendors.len(),
            parsed.quantities.len()
        )));
    }
    if !parsed.cost.is_empty() && parsed.cost.len() != parsed.vendors.len() {
        return Err(PredictorError::InvalidInput(format!(
            "{} vendors but {} costs",
            parsed.vendors.len(),
            parsed.cost.len()
        )));
    }

    let mut legs = Vec::with_capacity(parsed.vendors.len());
    for (i, vendor) in parsed.vendors.iter().enumerate() {
        let quantity = to_units(parsed.quantities[i], "quantity")?;
        legs.push(ProposedLeg {
            vendor: vendor.trim().to_string(),
            quantity,
            unit_cost: parsed.cost.get(i).copied(),
        });
    }

    if !legs.is_empty() {
        let split: u64 = legs.iter().map(|l| l.quantity).sum();
        if split != amount {
            return Err(PredictorError::InvalidInput(format!(
                "vendor quantities sum to {split}, amount is {amount}"
            )));
        }
    }
    legs.retain(|l| l.quantity > 0);

    Ok(DemandEstimate {
        amount,
        legs,
        reasoning: parsed.reasoning.unwrap_or_default(),
        constraint_blocked: parsed.constraint_blocked,
    })
}

/// Parse a chat intent from raw model text.
pub fn parse_intent(raw: &str) -> Result<ChatIntent, PredictorError> {
    let parsed: RawIntent = decode(raw)?;
    let quantity = parsed
        .quantity
        .map(|q| to_units(q, "quantity"))
        .transpose()?;
    let non_blank = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    Ok(ChatIntent {
        intent: parsed
            .intent
            .as_deref()
            .map(Intent::from_label)
            .unwrap_or(Intent::Other),
        sku: non_blank(parsed.sku),
        quantity,
        vendor: non_blank(parsed.vendor),
        response_text: parsed.response_text,
    })
}
