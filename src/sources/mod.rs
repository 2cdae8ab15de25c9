pub mod eu_watchlist;
pub mod presets;
pub mod snapshot;
pub mod tradingview;
pub mod yahoo;

pub use eu_watchlist::EuWatchlist;
pub use snapshot::SnapshotFile;
pub use tradingview::TradingViewScanner;
pub use yahoo::YahooScreener;

use crate::config::AppConfig;
use crate::data::{Fetcher, SourceTag};
use anyhow::{Context, Result};
use std::time::Duration;

const USER_AGENT: &str = concat!("movers_scan/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for the live fetchers.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Builds the fetchers named by the configuration, in configured order.
///
/// A configured snapshot file replaces every live source.
///
/// # Errors
/// Returns an error if the HTTP client cannot be built or a secondary source
/// has no scanner preset
pub fn build_fetchers(config: &AppConfig) -> Result<Vec<Box<dyn Fetcher>>> {
    if let Some(path) = &config.snapshot_path {
        let snapshot: Box<dyn Fetcher> = Box::new(SnapshotFile::new(path));
        return Ok(vec![snapshot]);
    }

    let client = http_client(config.http_timeout).context("Failed to build HTTP client")?;

    config
        .sources
        .iter()
        .map(|&tag| fetcher_for(tag, &client, config.scan_limit))
        .collect()
}

fn fetcher_for(tag: SourceTag, client: &reqwest::Client, limit: usize) -> Result<Box<dyn Fetcher>> {
    match tag {
        SourceTag::YahooLosers => Ok(Box::new(YahooScreener::day_losers(client.clone(), limit))),
        tag => {
            let preset = presets::preset_for(tag)
                .with_context(|| format!("No scanner preset for source {}", tag))?;
            Ok(Box::new(TradingViewScanner::new(client.clone(), preset, limit)))
        }
    }
}
