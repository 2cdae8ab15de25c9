use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifies the upstream listing a row or field came from.
///
/// The serialized form is the human-readable label that ends up in the
/// `source` array of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "Yahoo Finance")]
    YahooLosers,
    #[serde(rename = "TradingView Losers")]
    TradingViewLosers,
    #[serde(rename = "TradingView Oversold")]
    TradingViewOversold,
    #[serde(rename = "TradingView Large Cap")]
    TradingViewLargeCap,
}

impl SourceTag {
    /// Every source, in the default fetch order.
    pub const ALL: [SourceTag; 4] = [
        SourceTag::YahooLosers,
        SourceTag::TradingViewLosers,
        SourceTag::TradingViewOversold,
        SourceTag::TradingViewLargeCap,
    ];

    /// The family deciding which canonical fields this source may fill.
    pub fn family(self) -> SourceFamily {
        match self {
            SourceTag::YahooLosers => SourceFamily::Primary,
            SourceTag::TradingViewLosers
            | SourceTag::TradingViewOversold
            | SourceTag::TradingViewLargeCap => SourceFamily::Secondary,
        }
    }

    /// Human-readable label, as written to the `source` array and used as
    /// the fetcher name.
    pub fn label(self) -> &'static str {
        match self {
            SourceTag::YahooLosers => "Yahoo Finance",
            SourceTag::TradingViewLosers => "TradingView Losers",
            SourceTag::TradingViewOversold => "TradingView Oversold",
            SourceTag::TradingViewLargeCap => "TradingView Large Cap",
        }
    }

    /// Name used to select the source in configuration.
    pub fn config_key(self) -> &'static str {
        match self {
            SourceTag::YahooLosers => "yahoo-losers",
            SourceTag::TradingViewLosers => "tradingview-losers",
            SourceTag::TradingViewOversold => "tradingview-oversold",
            SourceTag::TradingViewLargeCap => "tradingview-large-cap",
        }
    }

    /// Looks up a source by its configuration key.
    ///
    /// # Arguments
    /// * `key`: Key such as `"tradingview-oversold"`; surrounding whitespace
    ///   and letter case are ignored
    ///
    /// # Returns
    /// The matching tag, or `None` for an unknown key
    pub fn from_config_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.config_key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which kind of listing a source is.
///
/// The primary source is the quote table (names, absolute change, average
/// volume, 52-week change). Secondary sources are the scanner presets
/// (relative volume, EPS, dividend yield, sector, rating, RSI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFamily {
    Primary,
    Secondary,
}

impl SourceFamily {
    /// Whether a record from this family may fill fields of `fields`.
    pub fn may_populate(self, fields: FieldFamily) -> bool {
        matches!(
            (self, fields),
            (_, FieldFamily::Shared)
                | (SourceFamily::Primary, FieldFamily::PrimaryOnly)
                | (SourceFamily::Secondary, FieldFamily::SecondaryOnly)
        )
    }
}

/// Groups of canonical fields by which sources are allowed to supply them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldFamily {
    /// price, percentChange, volume, marketCap, peRatio
    Shared,
    /// name, change, avgVolume, fiftyTwoWeekChange
    PrimaryOnly,
    /// relVolume, epsDilTTM, epsDilGrowthTTMYOY, divYieldTTM, sector,
    /// analystRating, rsi14
    SecondaryOnly,
}

/// The unified per-ticker record every source is reconciled into.
///
/// Numeric fields hold finite values or `None`; the normalizer never stores
/// NaN. `ticker` is upper-case and is the identity of the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub ticker: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub volume: Option<f64>,
    pub avg_volume: Option<f64>,
    pub rel_volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub fifty_two_week_change: Option<f64>,
    #[serde(rename = "epsDilTTM")]
    pub eps_dil_ttm: Option<f64>,
    #[serde(rename = "epsDilGrowthTTMYOY")]
    pub eps_dil_growth_ttm_yoy: Option<f64>,
    #[serde(rename = "divYieldTTM")]
    pub div_yield_ttm: Option<f64>,
    pub sector: Option<String>,
    pub analyst_rating: Option<String>,
    #[serde(rename = "rsi14")]
    pub rsi_14: Option<f64>,
    #[serde(default)]
    pub source: BTreeSet<SourceTag>,
}

impl CanonicalRecord {
    /// An empty record for `ticker` attributed to a single source.
    pub fn new(ticker: impl Into<String>, tag: SourceTag) -> Self {
        Self {
            ticker: ticker.into(),
            source: BTreeSet::from([tag]),
            ..Self::default()
        }
    }

    /// Whether any of the record's sources may supply `fields`.
    pub fn may_populate(&self, fields: FieldFamily) -> bool {
        self.source
            .iter()
            .any(|tag| tag.family().may_populate(fields))
    }
}
