use anyhow::Context;
use dotenv::dotenv;
use movers_scan::config::log_filter;
use movers_scan::data::DataIngestion;
use movers_scan::output::{
    load_sentiment, write_combined, write_dataset, write_watchlist, CombinedOutput,
};
use movers_scan::sources::{build_fetchers, http_client, presets, EuWatchlist};
use movers_scan::{AppConfig, Pipeline, PipelineReport};
use tracing::{info, warn};

/// Prints a per-stage summary of a finished run.
fn print_summary(report: &PipelineReport, failed_sources: &[String]) {
    println!("\nScan Summary:");
    println!("Raw rows: {}", report.raw_rows);
    println!("Rows without ticker: {}", report.empty_tickers);
    println!("Below market-cap floor: {}", report.below_floor);
    println!("Unique tickers: {}", report.unique_tickers);

    if !failed_sources.is_empty() {
        println!("Failed sources: {}", failed_sources.join(", "));
    }
}

/// Entry point of the mover scan.
///
/// 1. Load `.env` and initialize logging
/// 2. Read configuration and validate the scanner presets
/// 3. Collect raw rows from every configured source, in order
/// 4. Normalize, filter and deduplicate them
/// 5. Write the dataset, and the combined sentiment file when configured
/// 6. Capture the European watchlist snapshot when configured
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG may come from `.env`
    dotenv().ok();

    tracing_subscriber::fmt().with_env_filter(log_filter()).init();

    let config = AppConfig::from_env()?;
    presets::validate().context("Invalid scanner preset table")?;

    let ingestion = DataIngestion::new(build_fetchers(&config)?);
    info!(fetchers = ?ingestion.fetcher_names(), "Collecting mover listings");
    let outcome = ingestion.collect().await;

    let failed_sources: Vec<String> = outcome
        .failures
        .iter()
        .map(|failure| failure.fetcher.clone())
        .collect();
    if outcome.rows.is_empty() {
        warn!("No rows collected from any source");
    }

    let pipeline = Pipeline::new(config.min_market_cap);
    info!(floor = pipeline.min_market_cap(), "Running pipeline");
    let output = pipeline.run(outcome.rows);

    write_dataset(&config.output_path, &output.records).await?;
    info!(
        path = %config.output_path.display(),
        unique = output.records.len(),
        "Dataset written"
    );

    if let Some(sentiment_path) = &config.sentiment_path {
        let sentiment = load_sentiment(sentiment_path).await?;
        let combined = CombinedOutput::new(output.records, &sentiment);
        write_combined(&config.combined_path, &combined).await?;
        info!(path = %config.combined_path.display(), "Combined output written");
    }

    if let Some(eu_path) = &config.eu_snapshot_path {
        let client = http_client(config.http_timeout).context("Failed to build HTTP client")?;
        let snapshot = EuWatchlist::new(client, config.eu_tickers.clone()).snapshot().await;
        write_watchlist(eu_path, &snapshot).await?;
        info!(path = %eu_path.display(), tickers = snapshot.quotes.len(), "EU watchlist written");
    }

    print_summary(&output.report, &failed_sources);

    Ok(())
}
