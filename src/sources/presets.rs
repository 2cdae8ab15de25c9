//! Scanner presets: which columns each TradingView listing asks for and
//! which raw field each column feeds.
//!
//! These tables are configuration data. [`validate`] checks them once at
//! startup so a typo surfaces before any request is sent.

use crate::data::ingestion::fields;
use crate::data::{SourceFamily, SourceTag};
use std::collections::HashSet;
use thiserror::Error;

/// How a scanner cell is rendered into display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFormat {
    /// Strings as-is, numbers in plain decimal notation.
    Plain,
    /// Number followed by `%`.
    Percent,
    /// Symbol id such as `NASDAQ:AAPL`, reduced to `AAPL`.
    Symbol,
    /// Recommendation mark (1 = strong buy .. 5 = strong sell) as a label.
    Rating,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanColumn {
    pub scanner: &'static str,
    pub field: &'static str,
    pub format: CellFormat,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanFilter {
    pub left: &'static str,
    pub operation: &'static str,
    pub right: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanPreset {
    pub name: &'static str,
    pub tag: SourceTag,
    pub columns: &'static [ScanColumn],
    pub filters: &'static [ScanFilter],
    pub sort_by: &'static str,
    pub ascending: bool,
}

const fn column(scanner: &'static str, field: &'static str, format: CellFormat) -> ScanColumn {
    ScanColumn {
        scanner,
        field,
        format,
    }
}

/// Columns every scanner listing shares, after its preset-specific ones.
macro_rules! overview_columns {
    ($($lead:expr),* $(,)?) => {
        &[
            column("name", fields::TICKER, CellFormat::Symbol),
            $($lead,)*
            column("close", fields::PRICE, CellFormat::Plain),
            column("change", fields::PERCENT_CHANGE, CellFormat::Percent),
            column("volume", fields::VOLUME, CellFormat::Plain),
            column("relative_volume_10d_calc", fields::REL_VOLUME, CellFormat::Plain),
            column("market_cap_basic", fields::MARKET_CAP, CellFormat::Plain),
            column("price_earnings_ttm", fields::PE_RATIO_SECONDARY, CellFormat::Plain),
            column("earnings_per_share_diluted_ttm", fields::EPS_DIL_TTM, CellFormat::Plain),
            column(
                "earnings_per_share_diluted_yoy_growth_ttm",
                fields::EPS_DIL_GROWTH_TTM_YOY,
                CellFormat::Percent,
            ),
            column("dividends_yield_current", fields::DIV_YIELD_TTM, CellFormat::Percent),
            column("sector", fields::SECTOR, CellFormat::Plain),
            column("recommendation_mark", fields::ANALYST_RATING, CellFormat::Rating),
        ]
    };
}

pub const LOSERS: ScanPreset = ScanPreset {
    name: "losers",
    tag: SourceTag::TradingViewLosers,
    columns: overview_columns!(),
    filters: &[ScanFilter {
        left: "change",
        operation: "less",
        right: 0.0,
    }],
    sort_by: "change",
    ascending: true,
};

pub const OVERSOLD: ScanPreset = ScanPreset {
    name: "oversold",
    tag: SourceTag::TradingViewOversold,
    columns: overview_columns!(column("RSI", fields::RSI_14, CellFormat::Plain)),
    filters: &[ScanFilter {
        left: "RSI",
        operation: "less",
        right: 30.0,
    }],
    sort_by: "RSI",
    ascending: true,
};

pub const LARGE_CAP: ScanPreset = ScanPreset {
    name: "large-cap",
    tag: SourceTag::TradingViewLargeCap,
    columns: overview_columns!(),
    filters: &[ScanFilter {
        left: "market_cap_basic",
        operation: "greater",
        right: 10_000_000_000.0,
    }],
    sort_by: "market_cap_basic",
    ascending: false,
};

pub static PRESETS: &[ScanPreset] = &[LOSERS, OVERSOLD, LARGE_CAP];

/// Looks up the preset that produces rows tagged `tag`.
///
/// # Returns
/// The preset, or `None` for tags that are not scanner listings
pub fn preset_for(tag: SourceTag) -> Option<&'static ScanPreset> {
    PRESETS.iter().find(|preset| preset.tag == tag)
}

#[derive(Debug, Error, PartialEq)]
pub enum PresetError {
    #[error("preset has an empty name")]
    EmptyName,
    #[error("preset `{0}` is defined twice")]
    DuplicatePreset(&'static str),
    #[error("preset `{0}` has no ticker column")]
    MissingTicker(&'static str),
    #[error("preset `{preset}` repeats `{column}`")]
    DuplicateColumn {
        preset: &'static str,
        column: &'static str,
    },
    #[error("preset `{preset}` maps `{column}` to unknown field `{field}`")]
    UnknownField {
        preset: &'static str,
        column: &'static str,
        field: &'static str,
    },
    #[error("preset `{0}` is tagged with a primary source")]
    PrimaryTag(&'static str),
    #[error("preset `{preset}` sorts by `{column}`, which it does not request")]
    UnknownSortColumn {
        preset: &'static str,
        column: &'static str,
    },
}

/// Validates the built-in preset table.
pub fn validate() -> Result<(), PresetError> {
    validate_presets(PRESETS)
}

/// Validates a preset table.
///
/// # Errors
/// Returns the first problem found: an empty or repeated preset name, a
/// primary source tag, a column mapped to an unknown or repeated field, a
/// missing ticker column, or a sort column the preset does not request
pub fn validate_presets(presets: &[ScanPreset]) -> Result<(), PresetError> {
    let mut names = HashSet::new();

    for preset in presets {
        if preset.name.is_empty() {
            return Err(PresetError::EmptyName);
        }
        if !names.insert(preset.name) {
            return Err(PresetError::DuplicatePreset(preset.name));
        }
        if preset.tag.family() != SourceFamily::Secondary {
            return Err(PresetError::PrimaryTag(preset.name));
        }

        let mut scanner_columns = HashSet::new();
        let mut targets = HashSet::new();
        for column in preset.columns {
            if !fields::ALL.contains(&column.field) {
                return Err(PresetError::UnknownField {
                    preset: preset.name,
                    column: column.scanner,
                    field: column.field,
                });
            }
            if !scanner_columns.insert(column.scanner) || !targets.insert(column.field) {
                return Err(PresetError::DuplicateColumn {
                    preset: preset.name,
                    column: column.scanner,
                });
            }
        }

        if !targets.contains(fields::TICKER) {
            return Err(PresetError::MissingTicker(preset.name));
        }
        if !scanner_columns.contains(preset.sort_by) {
            return Err(PresetError::UnknownSortColumn {
                preset: preset.name,
                column: preset.sort_by,
            });
        }
    }

    Ok(())
}
