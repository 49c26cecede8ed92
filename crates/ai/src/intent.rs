use serde::{Deserialize, Serialize};

/// What the user asked for in a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Buy,
    Sell,
    CheckStock,
    Query,
    Other,
}

impl Intent {
    /// Lenient parse; anything unrecognised is `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            "CHECK_STOCK" => Self::CheckStock,
            "QUERY" => Self::Query,
            _ => Self::Other,
        }
    }
}

/// Structured form of a chat message, as produced by the intent model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatIntent {
    pub intent: Intent,
    pub sku: Option<String>,
    pub quantity: Option<u64>,
    pub vendor: Option<String>,
    /// Reply text, used as-is for `QUERY` and `OTHER`.
    pub response_text: Option<String>,
}

impl ChatIntent {
    pub fn buy(sku: impl Into<String>, quantity: Option<u64>, vendor: Option<&str>) -> Self {
        Self {
            intent: Intent::Buy,
            sku: Some(sku.into()),
            quantity,
            vendor: vendor.map(str::to_string),
            response_text: None,
        }
    }

    pub fn sell(sku: impl Into<String>, quantity: u64) -> Self {
        Self {
            intent: Intent::Sell,
            sku: Some(sku.into()),
            quantity: Some(quantity),
            vendor: None,
            response_text: None,
        }
    }

    pub fn check_stock(sku: impl Into<String>) -> Self {
        Self {
            intent: Intent::CheckStock,
            sku: Some(sku.into()),
            quantity: None,
            vendor: None,
            response_text: None,
        }
    }

    pub fn reply(intent: Intent, text: impl Into<String>) -> Self {
        Self {
            intent,
            sku: None,
            quantity: None,
            vendor: None,
            response_text: Some(text.into()),
        }
    }
}
