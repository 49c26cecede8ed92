//! JSON files backing the CLI: the repository snapshot and scripted estimates.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use restock_ai::{ScriptedPredictor, ScriptedResponse};
use restock_infra::Snapshot;

/// A missing state file is an empty repository.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "state file not found, starting empty");
        return Ok(Snapshot::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to decode state file {}", path.display()))
}

/// Written to a sibling temp file, then renamed over the target.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let encoded = serde_json::to_string_pretty(snapshot).context("failed to encode state")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, encoded)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace state file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "state saved");
    Ok(())
}

/// Decode an estimates file: an object mapping SKU name (or id) to the raw
/// model output. Non-string values are taken as the model's JSON directly.
pub fn parse_estimates(raw: &str) -> Result<Vec<(String, String)>> {
    let value: Value = serde_json::from_str(raw).context("estimates file is not JSON")?;
    let Value::Object(entries) = value else {
        bail!("estimates file must be a JSON object keyed by SKU");
    };
    Ok(entries
        .into_iter()
        .map(|(sku, text)| match text {
            Value::String(s) => (sku, s),
            other => (sku, other.to_string()),
        })
        .collect())
}

pub fn load_predictor(path: Option<&Path>) -> Result<ScriptedPredictor> {
    let Some(path) = path else {
        return Ok(ScriptedPredictor::new());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read estimates file {}", path.display()))?;
    let entries = parse_estimates(&raw)
        .with_context(|| format!("invalid estimates file {}", path.display()))?;
    tracing::debug!(count = entries.len(), "estimates loaded");
    Ok(entries
        .into_iter()
        .fold(ScriptedPredictor::new(), |predictor, (sku, text)| {
            predictor.respond(sku, ScriptedResponse::Raw(text))
        }))
}
