//! European watchlist snapshot: last close, day change and RSI-14 for a
//! fixed list of EU tickers, read from Yahoo's daily chart endpoint.
//!
//! The snapshot is a separate artifact. EU tickers carry no market cap or
//! screener tags, so they never enter the movers dataset.

use crate::data::{relative_strength_index, FetchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Tickers held in the portfolio, also the default watchlist.
pub const PORTFOLIO_TICKERS: [&str; 9] = [
    "NOVO-B.CO",
    "ASML.AS",
    "NKT.CO",
    "ALV.DE",
    "BESI.AS",
    "ORSTED.CO",
    "EVO.ST",
    "TEP.PA",
    "RELX.AS",
];

pub const RSI_PERIOD: usize = 14;

/// RSI below which a ticker is flagged as oversold.
pub const OVERSOLD_RSI: f64 = 32.0;

/// One watchlist ticker in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistQuote {
    pub price: Option<f64>,
    pub percent_change: Option<f64>,
    pub rsi: Option<f64>,
    pub oversold: bool,
    pub in_portfolio: bool,
}

impl WatchlistQuote {
    /// Builds a quote from daily closes, oldest first.
    ///
    /// Change and RSI need `RSI_PERIOD + 1` closes; with fewer, only the
    /// price is filled. Values are rounded to two decimals.
    ///
    /// # Arguments
    /// * `closes`: Daily closing prices, oldest first
    /// * `in_portfolio`: Whether the ticker is held
    pub fn from_closes(closes: &[f64], in_portfolio: bool) -> Self {
        let price = closes.last().copied().map(round2);

        let (percent_change, rsi) = match closes {
            [.., previous, last] if closes.len() > RSI_PERIOD && *previous != 0.0 => (
                Some(round2((last - previous) / previous * 100.0)),
                relative_strength_index(closes, RSI_PERIOD).map(round2),
            ),
            _ => (None, None),
        };

        Self {
            price,
            percent_change,
            oversold: rsi.map_or(false, |rsi| rsi < OVERSOLD_RSI),
            rsi,
            in_portfolio,
        }
    }

    /// Entry for a ticker whose history could not be fetched.
    pub fn unavailable(in_portfolio: bool) -> Self {
        Self {
            in_portfolio,
            ..Self::default()
        }
    }
}

/// The written snapshot: one entry per ticker plus the capture time.
#[derive(Debug, Clone, Serialize)]
pub struct WatchlistSnapshot {
    #[serde(rename = "_date")]
    pub date: DateTime<Utc>,
    #[serde(flatten)]
    pub quotes: BTreeMap<String, WatchlistQuote>,
}

/// Fetches daily closes for the watchlist tickers one by one.
pub struct EuWatchlist {
    client: reqwest::Client,
    tickers: Vec<String>,
    url: String,
}

impl EuWatchlist {
    /// Creates a watchlist over `tickers`, captured in the given order.
    pub fn new(client: reqwest::Client, tickers: Vec<String>) -> Self {
        Self {
            client,
            tickers,
            url: CHART_URL.to_string(),
        }
    }

    /// Points the watchlist at another chart endpoint, e.g. a local mirror.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Roughly one month of daily closes for `ticker`, oldest first.
    ///
    /// # Errors
    /// Returns a `FetchError` if the request fails, the endpoint reports an
    /// error, or the body has no close series
    pub async fn daily_closes(&self, ticker: &str) -> Result<Vec<f64>, FetchError> {
        let url = format!("{}/{}", self.url.trim_end_matches('/'), ticker);
        let body = self
            .client
            .get(&url)
            .query(&[("range", "1mo"), ("interval", "1d")])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        closes_from_response(&body)
    }

    /// Captures every ticker of the watchlist.
    ///
    /// A ticker that fails is logged and kept with empty values, so the
    /// snapshot always lists the whole watchlist.
    pub async fn snapshot(&self) -> WatchlistSnapshot {
        let mut quotes = BTreeMap::new();

        for ticker in &self.tickers {
            let in_portfolio = PORTFOLIO_TICKERS.contains(&ticker.as_str());
            let quote = match self.daily_closes(ticker).await {
                Ok(closes) => WatchlistQuote::from_closes(&closes, in_portfolio),
                Err(error) => {
                    warn!(ticker = ticker.as_str(), %error, "Watchlist ticker failed");
                    WatchlistQuote::unavailable(in_portfolio)
                }
            };
            quotes.insert(ticker.clone(), quote);
        }

        info!(tickers = quotes.len(), "Watchlist snapshot captured");
        WatchlistSnapshot {
            date: Utc::now(),
            quotes,
        }
    }
}

/// Extracts the close series of a chart response, skipping null closes.
pub fn closes_from_response(body: &Value) -> Result<Vec<f64>, FetchError> {
    let chart = body
        .get("chart")
        .ok_or_else(|| FetchError::UnexpectedShape("chart response has no `chart` object".to_string()))?;

    if let Some(error) = chart.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(FetchError::Api(message));
    }

    let closes = chart
        .pointer("/result/0/indicators/quote/0/close")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::UnexpectedShape("chart result has no close series".to_string()))?;

    Ok(closes.iter().filter_map(Value::as_f64).collect())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
