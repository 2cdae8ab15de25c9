use super::record::SourceTag;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;
use tracing::{info, warn};

/// Raw field names fetchers emit and the normalizer reads.
pub mod fields {
    pub const TICKER: &str = "ticker";
    pub const NAME: &str = "name";
    pub const PRICE: &str = "price";
    pub const CHANGE: &str = "change";
    pub const PERCENT_CHANGE: &str = "percentChange";
    pub const VOLUME: &str = "volume";
    pub const AVG_VOLUME: &str = "avgVolume";
    pub const REL_VOLUME: &str = "relVolume";
    pub const MARKET_CAP: &str = "marketCap";
    /// P/E as printed by the primary quote table.
    pub const PE_RATIO: &str = "peRatio";
    /// P/E as printed by the scanner presets; only a fallback for `PE_RATIO`.
    pub const PE_RATIO_SECONDARY: &str = "peRatioTV";
    pub const FIFTY_TWO_WEEK_CHANGE: &str = "fiftyTwoWeekChange";
    pub const EPS_DIL_TTM: &str = "epsDilTTM";
    pub const EPS_DIL_GROWTH_TTM_YOY: &str = "epsDilGrowthTTMYOY";
    pub const DIV_YIELD_TTM: &str = "divYieldTTM";
    pub const SECTOR: &str = "sector";
    pub const ANALYST_RATING: &str = "analystRating";
    pub const RSI_14: &str = "rsi14";

    /// Every raw field the normalizer understands.
    pub const ALL: [&str; 18] = [
        TICKER,
        NAME,
        PRICE,
        CHANGE,
        PERCENT_CHANGE,
        VOLUME,
        AVG_VOLUME,
        REL_VOLUME,
        MARKET_CAP,
        PE_RATIO,
        PE_RATIO_SECONDARY,
        FIFTY_TWO_WEEK_CHANGE,
        EPS_DIL_TTM,
        EPS_DIL_GROWTH_TTM_YOY,
        DIV_YIELD_TTM,
        SECTOR,
        ANALYST_RATING,
        RSI_14,
    ];
}

/// One source's unnormalized listing for one ticker.
///
/// Field names vary by source and values are whatever the source displayed,
/// usually text such as `"128.682M"` or `"-0.59%"`. The only structured part
/// is `source`, the list of tags naming the fetcher that produced the row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub source: Vec<SourceTag>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawRow {
    /// An empty row produced by the fetcher for `tag`.
    pub fn new(tag: SourceTag) -> Self {
        Self {
            source: vec![tag],
            fields: Map::new(),
        }
    }

    /// Builder-style [`RawRow::insert`].
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a raw field, replacing any previous value.
    ///
    /// # Arguments
    /// * `key`: Raw field name, normally one of [`fields`]
    /// * `value`: Display text or JSON value as the source showed it
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Display text of a field.
    ///
    /// Text is trimmed and empty text is treated as missing. JSON numbers are
    /// rendered in plain decimal notation so the text parsers can read them.
    /// Null, booleans, arrays and objects count as missing.
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.fields.get(key)? {
            Value::String(text) => {
                let text = text.trim();
                (!text.is_empty()).then_some(Cow::Borrowed(text))
            }
            Value::Number(number) => number.as_f64().map(|n| Cow::Owned(format!("{}", n))),
            _ => None,
        }
    }
}

/// Errors a fetcher can report for its whole page or request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
}

/// A source of raw mover rows.
///
/// Implementations return every row of their listing in display order. Each
/// row must carry a `ticker` field and a non-empty `source`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<RawRow>, FetchError>;
}

/// A fetcher that failed during collection.
#[derive(Debug)]
pub struct FetchFailure {
    pub fetcher: String,
    pub error: FetchError,
}

/// Rows gathered from all fetchers, plus the fetchers that failed.
#[derive(Debug, Default)]
pub struct IngestionOutcome {
    pub rows: Vec<RawRow>,
    pub failures: Vec<FetchFailure>,
}

/// Runs the configured fetchers and concatenates their rows.
///
/// Fetchers run one after another in the order given. Row order is part of
/// the contract: when two sources report the same ticker, the values that
/// arrive first win during the merge, so the preferred source goes first.
pub struct DataIngestion {
    fetchers: Vec<Box<dyn Fetcher>>,
}

impl DataIngestion {
    /// Creates an ingestion over `fetchers`, which run in the given order.
    pub fn new(fetchers: Vec<Box<dyn Fetcher>>) -> Self {
        Self { fetchers }
    }

    pub fn fetcher_names(&self) -> Vec<&str> {
        self.fetchers.iter().map(|f| f.name()).collect()
    }

    /// Collects rows from every fetcher.
    ///
    /// A failing fetcher is logged and recorded in
    /// [`IngestionOutcome::failures`]; the remaining fetchers still run.
    /// Rows without a source tag break the fetcher contract and are dropped.
    pub async fn collect(&self) -> IngestionOutcome {
        let mut outcome = IngestionOutcome::default();

        for fetcher in &self.fetchers {
            info!(fetcher = fetcher.name(), "Fetching rows");

            match fetcher.fetch().await {
                Ok(rows) => {
                    let fetched = rows.len();
                    let tagged: Vec<RawRow> =
                        rows.into_iter().filter(|row| !row.source.is_empty()).collect();

                    if tagged.len() < fetched {
                        warn!(
                            fetcher = fetcher.name(),
                            dropped = fetched - tagged.len(),
                            "Dropped rows without a source tag"
                        );
                    }

                    info!(fetcher = fetcher.name(), rows = tagged.len(), "Fetched rows");
                    outcome.rows.extend(tagged);
                }
                Err(error) => {
                    warn!(fetcher = fetcher.name(), %error, "Fetcher failed, continuing without it");
                    outcome.failures.push(FetchFailure {
                        fetcher: fetcher.name().to_string(),
                        error,
                    });
                }
            }
        }

        outcome
    }
}
