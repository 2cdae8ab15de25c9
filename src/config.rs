use crate::consolidation::DEFAULT_MIN_MARKET_CAP;
use crate::data::SourceTag;
use crate::sources::eu_watchlist::PORTFOLIO_TICKERS;
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Log directives used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "movers_scan=info";

/// Runtime settings of the scan.
///
/// Every setting comes from an environment variable (a `.env` file is loaded
/// by the binary first) and has a default, so an empty environment runs the
/// full live scan.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Fetchers in the order they run; the first wins shared fields.
    pub sources: Vec<SourceTag>,
    pub min_market_cap: f64,
    /// Rows requested from each live source.
    pub scan_limit: usize,
    pub http_timeout: Duration,
    pub output_path: PathBuf,
    /// Replaces the live fetchers with a captured snapshot when set.
    pub snapshot_path: Option<PathBuf>,
    /// Sentiment document merged into the combined artifact when set.
    pub sentiment_path: Option<PathBuf>,
    pub combined_path: PathBuf,
    /// European watchlist snapshot is captured and written here when set.
    pub eu_snapshot_path: Option<PathBuf>,
    pub eu_tickers: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: SourceTag::ALL.to_vec(),
            min_market_cap: DEFAULT_MIN_MARKET_CAP,
            scan_limit: 150,
            http_timeout: Duration::from_secs(30),
            output_path: PathBuf::from("movers.json"),
            snapshot_path: None,
            sentiment_path: None,
            combined_path: PathBuf::from("combined_output.json"),
            eu_snapshot_path: None,
            eu_tickers: PORTFOLIO_TICKERS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that does not parse,
    /// or if `MOVERS_SOURCES` names an unknown source
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let sources = match var("MOVERS_SOURCES") {
            Some(list) => parse_sources(&list)?,
            None => defaults.sources,
        };

        let min_market_cap: f64 = parse_var(&var, "MOVERS_MIN_MARKET_CAP", defaults.min_market_cap)?;
        if !min_market_cap.is_finite() || min_market_cap < 0.0 {
            return Err(anyhow!(
                "MOVERS_MIN_MARKET_CAP must be a non-negative number, got {}",
                min_market_cap
            ));
        }

        let timeout_secs: u64 = parse_var(&var, "MOVERS_HTTP_TIMEOUT_SECS", defaults.http_timeout.as_secs())?;

        Ok(Self {
            sources,
            min_market_cap,
            scan_limit: parse_var(&var, "MOVERS_SCAN_LIMIT", defaults.scan_limit)?,
            http_timeout: Duration::from_secs(timeout_secs),
            output_path: var("MOVERS_OUTPUT_PATH").map(PathBuf::from).unwrap_or(defaults.output_path),
            snapshot_path: var("MOVERS_SNAPSHOT_PATH").map(PathBuf::from),
            sentiment_path: var("MOVERS_SENTIMENT_PATH").map(PathBuf::from),
            combined_path: var("MOVERS_COMBINED_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.combined_path),
            eu_snapshot_path: var("MOVERS_EU_SNAPSHOT_PATH").map(PathBuf::from),
            eu_tickers: match var("MOVERS_EU_TICKERS") {
                Some(list) => parse_tickers(&list)?,
                None => defaults.eu_tickers,
            },
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, value)),
        None => Ok(default),
    }
}

/// Parses a comma-separated list of source keys, keeping the given order.
fn parse_sources(list: &str) -> Result<Vec<SourceTag>> {
    let mut sources = Vec::new();

    for key in list.split(',').map(str::trim).filter(|key| !key.is_empty()) {
        let tag = SourceTag::from_config_key(key).ok_or_else(|| {
            let known: Vec<&str> = SourceTag::ALL.iter().map(|t| t.config_key()).collect();
            anyhow!("Unknown source `{}` in MOVERS_SOURCES (known: {})", key, known.join(", "))
        })?;
        if !sources.contains(&tag) {
            sources.push(tag);
        }
    }

    if sources.is_empty() {
        return Err(anyhow!("MOVERS_SOURCES does not name any source"));
    }

    Ok(sources)
}

/// Log filter from the process environment.
///
/// Reads `RUST_LOG`, so a `.env` file has to be loaded before this is called
/// for its directives to apply.
pub fn log_filter() -> EnvFilter {
    log_filter_from(|key| std::env::var(key).ok())
}

/// Log filter from the `RUST_LOG` value `lookup` returns, falling back to
/// [`DEFAULT_LOG_FILTER`] when it is missing or does not parse.
pub fn log_filter_from(lookup: impl Fn(&str) -> Option<String>) -> EnvFilter {
    lookup(EnvFilter::DEFAULT_ENV)
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Parses a comma-separated ticker list, dropping repeats.
fn parse_tickers(list: &str) -> Result<Vec<String>> {
    let mut tickers: Vec<String> = Vec::new();

    for ticker in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let ticker = ticker.to_uppercase();
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }

    if tickers.is_empty() {
        return Err(anyhow!("MOVERS_EU_TICKERS does not name any ticker"));
    }

    Ok(tickers)
}
