use crate::data::{CanonicalRecord, FieldFamily};
use std::collections::HashMap;
use tracing::debug;

/// Folds per-source records into one record per ticker.
///
/// Tickers come out in the order they were first seen. The first record for
/// a ticker seeds the result and every later one is folded in with
/// [`merge_pair`], so for shared fields the first valid value wins and later
/// records only fill gaps.
///
/// Precondition: every ticker is non-empty. The pipeline drops empty tickers
/// before this step and nothing here checks it again.
pub fn merge_records(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut merged: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(records.len());

    for record in records {
        match slots.get(&record.ticker) {
            Some(&slot) => {
                debug!(ticker = %record.ticker, "Merging duplicate ticker");
                let existing = std::mem::take(&mut merged[slot]);
                merged[slot] = merge_pair(existing, &record);
            }
            None => {
                slots.insert(record.ticker.clone(), merged.len());
                merged.push(record);
            }
        }
    }

    merged
}

/// Builds the record that results from folding `incoming` into `existing`.
///
/// * `source` becomes the union of both tag sets.
/// * Shared fields keep the existing value when it is a finite number.
/// * Primary-only fields are filled the same way, but only from a record the
///   primary source contributed to.
/// * Secondary-only fields are filled only from a record a secondary source
///   contributed to, and replace any blank existing value: `None`, zero, NaN
///   or empty text. A real zero is therefore overwritten, even by `None`.
pub fn merge_pair(existing: CanonicalRecord, incoming: &CanonicalRecord) -> CanonicalRecord {
    let primary = incoming.may_populate(FieldFamily::PrimaryOnly);
    let secondary = incoming.may_populate(FieldFamily::SecondaryOnly);

    let mut source = existing.source;
    source.extend(incoming.source.iter().copied());

    CanonicalRecord {
        ticker: existing.ticker,
        source,

        price: first_valid(existing.price, incoming.price),
        percent_change: first_valid(existing.percent_change, incoming.percent_change),
        volume: first_valid(existing.volume, incoming.volume),
        market_cap: first_valid(existing.market_cap, incoming.market_cap),
        pe_ratio: first_valid(existing.pe_ratio, incoming.pe_ratio),

        name: gated(primary, existing.name, |name| name.or_else(|| incoming.name.clone())),
        change: gated(primary, existing.change, |v| first_valid(v, incoming.change)),
        avg_volume: gated(primary, existing.avg_volume, |v| first_valid(v, incoming.avg_volume)),
        fifty_two_week_change: gated(primary, existing.fifty_two_week_change, |v| {
            first_valid(v, incoming.fifty_two_week_change)
        }),

        rel_volume: gated(secondary, existing.rel_volume, |v| fill_blank(v, &incoming.rel_volume)),
        eps_dil_ttm: gated(secondary, existing.eps_dil_ttm, |v| fill_blank(v, &incoming.eps_dil_ttm)),
        eps_dil_growth_ttm_yoy: gated(secondary, existing.eps_dil_growth_ttm_yoy, |v| {
            fill_blank(v, &incoming.eps_dil_growth_ttm_yoy)
        }),
        div_yield_ttm: gated(secondary, existing.div_yield_ttm, |v| {
            fill_blank(v, &incoming.div_yield_ttm)
        }),
        sector: gated(secondary, existing.sector, |v| fill_blank(v, &incoming.sector)),
        analyst_rating: gated(secondary, existing.analyst_rating, |v| {
            fill_blank(v, &incoming.analyst_rating)
        }),
        rsi_14: gated(secondary, existing.rsi_14, |v| fill_blank(v, &incoming.rsi_14)),
    }
}

fn gated<T>(allowed: bool, existing: T, merge: impl FnOnce(T) -> T) -> T {
    if allowed {
        merge(existing)
    } else {
        existing
    }
}

/// Existing value if it is a finite number, otherwise the incoming one.
fn first_valid(existing: Option<f64>, incoming: Option<f64>) -> Option<f64> {
    match existing {
        Some(value) if value.is_finite() => Some(value),
        _ => incoming,
    }
}

/// Values the secondary-field rule treats as empty.
trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for f64 {
    fn is_blank(&self) -> bool {
        *self == 0.0 || self.is_nan()
    }
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

fn fill_blank<T: Blank + Clone>(existing: Option<T>, incoming: &Option<T>) -> Option<T> {
    match existing {
        Some(value) if !value.is_blank() => Some(value),
        _ => incoming.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SourceTag;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn record(ticker: &str, tag: SourceTag) -> CanonicalRecord {
        CanonicalRecord::new(ticker, tag)
    }

    fn priced(ticker: &str, tag: SourceTag, price: Option<f64>) -> CanonicalRecord {
        CanonicalRecord {
            price,
            ..record(ticker, tag)
        }
    }

    #[test]
    fn test_existing_price_wins_and_sources_union() {
        let a = priced("ABC", SourceTag::YahooLosers, Some(10.0));
        let b = priced("ABC", SourceTag::TradingViewLosers, None);

        let merged = merge_records(vec![a, b]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].price, Some(10.0));
        assert_eq!(
            merged[0].source,
            BTreeSet::from([SourceTag::YahooLosers, SourceTag::TradingViewLosers])
        );
    }

    #[test]
    fn test_missing_price_is_filled_regardless_of_order() {
        let b = priced("ABC", SourceTag::TradingViewLosers, None);
        let a = priced("ABC", SourceTag::YahooLosers, Some(10.0));

        let merged = merge_records(vec![b, a]);

        assert_eq!(merged[0].price, Some(10.0));
    }

    #[test]
    fn test_first_valid_price_wins() {
        let b = priced("ABC", SourceTag::TradingViewLosers, Some(5.0));
        let a = priced("ABC", SourceTag::YahooLosers, Some(10.0));

        let merged = merge_records(vec![b, a]);

        assert_eq!(merged[0].price, Some(5.0));
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let first = priced("ABC", SourceTag::TradingViewLosers, Some(f64::NAN));
        let second = priced("ABC", SourceTag::TradingViewOversold, Some(7.5));

        assert_eq!(merge_pair(first, &second).price, Some(7.5));
    }

    #[test]
    fn test_primary_fields_only_from_primary_source() {
        let existing = record("ABC", SourceTag::TradingViewLosers);
        let secondary = CanonicalRecord {
            name: Some("Not trusted".to_string()),
            change: Some(-1.0),
            ..record("ABC", SourceTag::TradingViewOversold)
        };
        let primary = CanonicalRecord {
            name: Some("ABC Corp".to_string()),
            change: Some(-2.0),
            avg_volume: Some(1_000.0),
            fifty_two_week_change: Some(-30.0),
            ..record("ABC", SourceTag::YahooLosers)
        };

        let after_secondary = merge_pair(existing, &secondary);
        assert_eq!(after_secondary.name, None);
        assert_eq!(after_secondary.change, None);

        let after_primary = merge_pair(after_secondary, &primary);
        assert_eq!(after_primary.name.as_deref(), Some("ABC Corp"));
        assert_eq!(after_primary.change, Some(-2.0));
        assert_eq!(after_primary.avg_volume, Some(1_000.0));
        assert_eq!(after_primary.fifty_two_week_change, Some(-30.0));
    }

    #[test]
    fn test_secondary_fields_only_from_secondary_source() {
        let existing = record("ABC", SourceTag::YahooLosers);
        let primary = CanonicalRecord {
            sector: Some("Finance".to_string()),
            rsi_14: Some(25.0),
            ..record("ABC", SourceTag::YahooLosers)
        };
        let secondary = CanonicalRecord {
            sector: Some("Technology".to_string()),
            rsi_14: Some(28.0),
            rel_volume: Some(1.7),
            ..record("ABC", SourceTag::TradingViewOversold)
        };

        let after_primary = merge_pair(existing, &primary);
        assert_eq!(after_primary.sector, None);
        assert_eq!(after_primary.rsi_14, None);

        let after_secondary = merge_pair(after_primary, &secondary);
        assert_eq!(after_secondary.sector.as_deref(), Some("Technology"));
        assert_eq!(after_secondary.rsi_14, Some(28.0));
        assert_eq!(after_secondary.rel_volume, Some(1.7));
    }

    #[test]
    fn test_secondary_zero_is_treated_as_blank() {
        let existing = CanonicalRecord {
            div_yield_ttm: Some(0.0),
            sector: Some(String::new()),
            ..record("ABC", SourceTag::TradingViewLosers)
        };
        let filled = CanonicalRecord {
            div_yield_ttm: Some(1.2),
            sector: Some("Energy".to_string()),
            ..record("ABC", SourceTag::TradingViewLargeCap)
        };
        let empty = record("ABC", SourceTag::TradingViewLargeCap);

        let merged = merge_pair(existing.clone(), &filled);
        assert_eq!(merged.div_yield_ttm, Some(1.2));
        assert_eq!(merged.sector.as_deref(), Some("Energy"));

        let erased = merge_pair(existing, &empty);
        assert_eq!(erased.div_yield_ttm, None);
    }

    #[test]
    fn test_preserves_first_seen_order() {
        let merged = merge_records(vec![
            record("CCC", SourceTag::YahooLosers),
            record("AAA", SourceTag::YahooLosers),
            record("CCC", SourceTag::TradingViewLosers),
            record("BBB", SourceTag::TradingViewLosers),
            record("AAA", SourceTag::TradingViewOversold),
        ]);

        let tickers: Vec<&str> = merged.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["CCC", "AAA", "BBB"]);
    }

    #[test]
    fn test_merge_is_idempotent_on_deduplicated_input() {
        let deduplicated = vec![
            CanonicalRecord {
                price: Some(12.0),
                name: Some("Alpha".to_string()),
                div_yield_ttm: Some(0.0),
                ..record("AAA", SourceTag::YahooLosers)
            },
            CanonicalRecord {
                market_cap: Some(4.2e9),
                sector: Some("Utilities".to_string()),
                source: BTreeSet::from([SourceTag::TradingViewLosers, SourceTag::YahooLosers]),
                ..record("BBB", SourceTag::TradingViewLosers)
            },
        ];

        assert_eq!(merge_records(deduplicated.clone()), deduplicated);

        let doubled: Vec<CanonicalRecord> = deduplicated
            .iter()
            .chain(deduplicated.iter())
            .cloned()
            .collect();
        assert_eq!(merge_records(doubled), deduplicated);
    }

    fn arb_record() -> impl Strategy<Value = CanonicalRecord> {
        (
            prop::sample::select(vec!["AAA", "BBB", "CCC", "DDD"]),
            prop::collection::vec(prop::sample::select(SourceTag::ALL.to_vec()), 1..4),
            prop::option::of(0.5..500.0_f64),
            prop::option::of(prop::sample::select(vec!["Alpha".to_string(), String::new()])),
            prop::option::of(0.0..1e12_f64),
            prop::option::of(prop_oneof![Just(0.0), 0.1..10.0_f64]),
            prop::option::of(prop::sample::select(vec!["Energy".to_string(), String::new()])),
        )
            .prop_map(|(ticker, tags, price, name, market_cap, div_yield_ttm, sector)| CanonicalRecord {
                ticker: ticker.to_string(),
                source: tags.into_iter().collect(),
                price,
                name,
                market_cap,
                div_yield_ttm,
                sector,
                ..CanonicalRecord::default()
            })
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(records in prop::collection::vec(arb_record(), 0..24)) {
            let merged = merge_records(records);
            prop_assert_eq!(merge_records(merged.clone()), merged);
        }

        #[test]
        fn merge_keeps_first_seen_order_and_unions_sources(
            records in prop::collection::vec(arb_record(), 0..24),
        ) {
            let mut expected: Vec<(String, BTreeSet<SourceTag>)> = Vec::new();
            for record in &records {
                match expected.iter_mut().find(|(ticker, _)| *ticker == record.ticker) {
                    Some((_, source)) => source.extend(record.source.iter().copied()),
                    None => expected.push((record.ticker.clone(), record.source.clone())),
                }
            }

            let merged: Vec<(String, BTreeSet<SourceTag>)> = merge_records(records)
                .into_iter()
                .map(|record| (record.ticker, record.source))
                .collect();
            prop_assert_eq!(merged, expected);
        }
    }
}
