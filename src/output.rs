use crate::data::CanonicalRecord;
use crate::sources::eu_watchlist::WatchlistSnapshot;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// The scan bundled with social-sentiment listings for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedOutput {
    pub generated_at: DateTime<Utc>,
    pub movers_scan: Vec<CanonicalRecord>,
    pub wallstreetbets_sentiment: Vec<Value>,
    pub unusual_options_activity: Vec<Value>,
}

impl CombinedOutput {
    /// Bundles `records` with the sentiment arrays of `sentiment`.
    ///
    /// A sentiment document without one of the arrays contributes an empty
    /// list for it.
    pub fn new(records: Vec<CanonicalRecord>, sentiment: &Value) -> Self {
        let list = |key: &str| {
            sentiment
                .get(key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };

        Self {
            generated_at: Utc::now(),
            movers_scan: records,
            wallstreetbets_sentiment: list("wallstreetbets_sentiment"),
            unusual_options_activity: list("unusual_options_activity"),
        }
    }
}

/// Writes the final records as a pretty-printed JSON array.
///
/// Missing parent directories are created.
///
/// # Errors
/// Returns an error if the directory or the file cannot be written
pub async fn write_dataset(path: &Path, records: &[CanonicalRecord]) -> Result<()> {
    write_json(path, records).await
}

/// Writes the combined scan and sentiment artifact.
pub async fn write_combined(path: &Path, combined: &CombinedOutput) -> Result<()> {
    write_json(path, combined).await
}

/// Writes the European watchlist snapshot, keyed by ticker.
pub async fn write_watchlist(path: &Path, snapshot: &WatchlistSnapshot) -> Result<()> {
    write_json(path, snapshot).await
}

/// Reads the sentiment document produced by the social scrapers.
///
/// # Arguments
/// * `path`: JSON file holding `wallstreetbets_sentiment` and
///   `unusual_options_activity` arrays
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid JSON
pub async fn load_sentiment(path: &Path) -> Result<Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read sentiment file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Sentiment file {} is not valid JSON", path.display()))
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
