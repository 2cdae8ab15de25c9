use crate::consolidation::{filter_by_market_cap, merge_records, DEFAULT_MIN_MARKET_CAP};
use crate::data::{normalize_batch, CanonicalRecord, RawRow};
use tracing::info;

/// Row counts observed at each stage of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub raw_rows: usize,
    pub empty_tickers: usize,
    pub below_floor: usize,
    pub unique_tickers: usize,
}

/// Final records of a run with the counts that produced them.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<CanonicalRecord>,
    pub report: PipelineReport,
}

/// Turns collected raw rows into the deduplicated dataset.
///
/// Stages run in a fixed order over the whole batch:
/// 1. Normalize every row to the canonical schema
/// 2. Drop records without a ticker
/// 3. Drop records below the market-cap floor
/// 4. Merge records sharing a ticker
///
/// Rows are never reordered; the first row seen for a ticker decides its
/// position in the output and wins shared fields.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    min_market_cap: f64,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_MARKET_CAP)
    }
}

impl Pipeline {
    /// Creates a pipeline that drops records below `min_market_cap`.
    pub fn new(min_market_cap: f64) -> Self {
        Self { min_market_cap }
    }

    /// Market-cap floor applied by [`Pipeline::run`].
    pub fn min_market_cap(&self) -> f64 {
        self.min_market_cap
    }

    /// Runs every stage over a batch of raw rows.
    ///
    /// # Arguments
    /// * `raw_rows`: Rows from all fetchers, in fetch order
    ///
    /// # Returns
    /// The deduplicated records in first-seen order, with a `PipelineReport`
    /// of how many rows each stage removed
    pub fn run(&self, raw_rows: Vec<RawRow>) -> PipelineOutput {
        let raw_count = raw_rows.len();

        info!(rows = raw_count, "Normalizing raw rows");
        let normalized = normalize_batch(&raw_rows);
        let normalized_count = normalized.len();

        let filtered = filter_by_market_cap(normalized, self.min_market_cap);
        let filtered_count = filtered.len();
        info!(
            removed = normalized_count - filtered_count,
            floor = self.min_market_cap,
            "Filtered records below market-cap floor"
        );

        let records = merge_records(filtered);
        info!(unique = records.len(), "Deduplication complete");

        PipelineOutput {
            report: PipelineReport {
                raw_rows: raw_count,
                empty_tickers: raw_count - normalized_count,
                below_floor: normalized_count - filtered_count,
                unique_tickers: records.len(),
            },
            records,
        }
    }
}
