use crate::data::CanonicalRecord;

/// Smallest market cap kept by default: 100 million.
pub const DEFAULT_MIN_MARKET_CAP: f64 = 100_000_000.0;

/// Drops records whose known market cap is below `floor`.
///
/// Records with no usable market cap are kept: a missing value says nothing
/// about the size of the company. Order is preserved.
pub fn filter_by_market_cap(records: Vec<CanonicalRecord>, floor: f64) -> Vec<CanonicalRecord> {
    records
        .into_iter()
        .filter(|record| passes_floor(record, floor))
        .collect()
}

fn passes_floor(record: &CanonicalRecord, floor: f64) -> bool {
    match record.market_cap {
        Some(cap) if cap.is_finite() => cap >= floor,
        _ => true,
    }
}
