use super::ingestion::{fields, RawRow};
use super::parsing::{
    is_placeholder, parse_change, parse_currency, parse_percent, parse_ratio, parse_volume,
};
use super::record::{CanonicalRecord, SourceFamily, SourceTag};
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Relative P/E disagreement between the two sources worth reporting.
pub const PE_DEVIATION_THRESHOLD: f64 = 0.05;

/// Maps one source-specific row onto the canonical schema.
///
/// Total over any row shape: missing fields, placeholders (`"—"`, `"--"`)
/// and unparseable text all become `None`. The ticker is upper-cased and is
/// left empty when the row has none; callers drop such records (see
/// [`normalize_batch`]).
///
/// # Arguments
/// * `row`: Raw row as produced by a fetcher
///
/// # Returns
/// A `CanonicalRecord` holding only canonical fields
pub fn normalize(row: &RawRow) -> CanonicalRecord {
    let source: BTreeSet<SourceTag> = row.source.iter().copied().collect();
    let ticker = row
        .text(fields::TICKER)
        .map(|ticker| ticker.to_uppercase())
        .unwrap_or_default();

    let number = |key: &str, parse: fn(Option<&str>) -> Option<f64>| {
        parse(present(row, key).as_deref())
    };
    let text = |key: &str| present(row, key).map(Cow::into_owned);

    CanonicalRecord {
        name: text(fields::NAME),
        price: number(fields::PRICE, parse_currency),
        change: number(fields::CHANGE, parse_change),
        percent_change: number(fields::PERCENT_CHANGE, parse_percent),
        volume: number(fields::VOLUME, parse_volume),
        avg_volume: number(fields::AVG_VOLUME, parse_volume),
        rel_volume: number(fields::REL_VOLUME, parse_volume),
        market_cap: resolve_market_cap(present(row, fields::MARKET_CAP).as_deref(), &source),
        pe_ratio: resolve_pe_ratio(
            &ticker,
            present(row, fields::PE_RATIO).as_deref(),
            present(row, fields::PE_RATIO_SECONDARY).as_deref(),
        ),
        fifty_two_week_change: number(fields::FIFTY_TWO_WEEK_CHANGE, parse_percent),
        eps_dil_ttm: number(fields::EPS_DIL_TTM, parse_currency),
        eps_dil_growth_ttm_yoy: number(fields::EPS_DIL_GROWTH_TTM_YOY, parse_percent),
        div_yield_ttm: number(fields::DIV_YIELD_TTM, parse_percent),
        sector: text(fields::SECTOR),
        analyst_rating: text(fields::ANALYST_RATING),
        rsi_14: number(fields::RSI_14, parse_currency),
        ticker,
        source,
    }
}

/// Normalizes every row and drops the records left without a ticker.
///
/// Output order follows input order, which the merge step relies on.
pub fn normalize_batch(rows: &[RawRow]) -> Vec<CanonicalRecord> {
    let records: Vec<CanonicalRecord> = rows
        .iter()
        .map(normalize)
        .filter(|record| !record.ticker.is_empty())
        .collect();

    let dropped = rows.len() - records.len();
    if dropped > 0 {
        info!(dropped, "Dropped rows without a ticker");
    }

    records
}

/// Picks the market cap of a row.
///
/// The primary quote table is trusted as-is, absent or not. Any other source
/// only contributes a value that parsed to a finite number.
pub fn resolve_market_cap(raw: Option<&str>, source: &BTreeSet<SourceTag>) -> Option<f64> {
    let parsed = parse_volume(raw);

    if source
        .iter()
        .any(|tag| tag.family() == SourceFamily::Primary)
    {
        parsed
    } else {
        parsed.filter(|cap| cap.is_finite())
    }
}

/// Consolidates the primary and secondary P/E columns into one value.
///
/// The primary value is authoritative: when both parse, the primary one is
/// kept whatever their deviation, and a deviation above
/// [`PE_DEVIATION_THRESHOLD`] is only logged. The secondary value is used
/// when the primary one is missing.
pub fn resolve_pe_ratio(ticker: &str, primary: Option<&str>, secondary: Option<&str>) -> Option<f64> {
    match (parse_ratio(primary), parse_ratio(secondary)) {
        (Some(p1), Some(p2)) => {
            let deviation = ((p1 - p2) / p1).abs();
            if deviation > PE_DEVIATION_THRESHOLD {
                debug!(ticker, primary = p1, secondary = p2, deviation, "P/E sources disagree, keeping primary");
            }
            Some(p1)
        }
        (Some(p1), None) => Some(p1),
        (None, p2) => p2,
    }
}

/// Calculates the Relative Strength Index over daily closes.
///
/// The first `period` price changes seed the average gain and loss; every
/// later change is folded in with Wilder's smoothing. A series without any
/// losses scores 100.
///
/// # Arguments
/// * `closes`: Closing prices, oldest first
/// * `period`: Number of price changes in the seed window, usually 14
///
/// # Returns
/// The RSI value, or `None` if there are fewer than `period + 1` closes
pub fn relative_strength_index(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let gain = |change: f64| change.max(0.0);
    let loss = |change: f64| (-change).max(0.0);
    let window = period as f64;

    let mut avg_gain = changes[..period].iter().copied().map(gain).sum::<f64>() / window;
    let mut avg_loss = changes[..period].iter().copied().map(loss).sum::<f64>() / window;

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (window - 1.0) + gain(change)) / window;
        avg_loss = (avg_loss * (window - 1.0) + loss(change)) / window;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// Field text with placeholder tokens treated as missing.
fn present<'a>(row: &'a RawRow, key: &str) -> Option<Cow<'a, str>> {
    row.text(key).filter(|text| !is_placeholder(text))
}
