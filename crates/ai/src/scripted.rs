//! A predictor that answers from a fixed script.
//!
//! Used by tests and by the CLI, where estimates are produced out of band and
//! handed in as a file. Responses are keyed by SKU id or by SKU name
//! (case-insensitive).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::parse::parse_estimate;
use crate::predictor::{DemandEstimate, DemandPredictor, DemandRequest, PredictorError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    Estimate(DemandEstimate),
    /// Raw model text, decoded with [`parse_estimate`] on each call.
    Raw(String),
    Fail(String),
}

#[derive(Debug, Default)]
pub struct ScriptedPredictor {
    responses: HashMap<String, ScriptedResponse>,
    delay: Option<Duration>,
    requests: Mutex<Vec<DemandRequest>>,
}

impl ScriptedPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for a SKU id (display form) or SKU name.
    pub fn respond(mut self, key: impl AsRef<str>, response: ScriptedResponse) -> Self {
        self.responses
            .insert(key.as_ref().trim().to_lowercase(), response);
        self
    }

    pub fn estimate(self, key: impl AsRef<str>, estimate: DemandEstimate) -> Self {
        self.respond(key, ScriptedResponse::Estimate(estimate))
    }

    /// Sleep before answering (exercises caller timeouts).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<DemandRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn lookup(&self, request: &DemandRequest) -> Option<&ScriptedResponse> {
        self.responses
            .get(&request.sku_id.to_string())
            .or_else(|| self.responses.get(&request.sku_name.trim().to_lowercase()))
    }
}

#[async_trait::async_trait]
impl DemandPredictor for ScriptedPredictor {
    async fn estimate_demand(
        &self,
        request: &DemandRequest,
    ) -> Result<DemandEstimate, PredictorError> {
        self.requests
            .lock()
            .map_err(|_| PredictorError::Internal("lock poisoned".to_string()))?
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.lookup(request) {
            Some(ScriptedResponse::Estimate(estimate)) => Ok(estimate.clone()),
            Some(ScriptedResponse::Raw(raw)) => parse_estimate(raw),
            Some(ScriptedResponse::Fail(reason)) => {
                Err(PredictorError::InferenceFailed(reason.clone()))
            }
            None => {
                tracing::debug!(sku = %request.sku_id, "no scripted estimate");
                Err(PredictorError::InferenceFailed(format!(
                    "no estimate available for '{}'",
                    request.sku_name
                )))
            }
        }
    }
}
