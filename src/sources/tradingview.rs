use super::presets::{CellFormat, ScanPreset};
use crate::data::ingestion::fields;
use crate::data::{FetchError, Fetcher, RawRow};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

pub const SCAN_URL: &str = "https://scanner.tradingview.com/america/scan";

/// Fetches one scanner preset (losers, oversold, large cap) from the
/// TradingView scan API.
///
/// The API answers with positional cells; they are mapped back to raw field
/// names using the preset's column table and rendered as display text, so
/// these rows go through the same parsers as scraped table cells.
pub struct TradingViewScanner {
    client: reqwest::Client,
    preset: &'static ScanPreset,
    limit: usize,
    url: String,
}

impl TradingViewScanner {
    /// Creates a scanner for `preset`.
    ///
    /// # Arguments
    /// * `client`: Shared HTTP client
    /// * `preset`: Columns, filters and sort order of the listing
    /// * `limit`: Number of rows requested
    pub fn new(client: reqwest::Client, preset: &'static ScanPreset, limit: usize) -> Self {
        Self {
            client,
            preset,
            limit,
            url: SCAN_URL.to_string(),
        }
    }

    /// Points the scanner at another endpoint, e.g. a local mirror.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// JSON body of the scan request.
    pub fn request_body(&self) -> Value {
        let columns: Vec<&str> = self.preset.columns.iter().map(|c| c.scanner).collect();
        let filters: Vec<Value> = self
            .preset
            .filters
            .iter()
            .map(|f| json!({ "left": f.left, "operation": f.operation, "right": f.right }))
            .collect();

        json!({
            "filter": filters,
            "options": { "lang": "en" },
            "markets": ["america"],
            "symbols": { "query": { "types": [] }, "tickers": [] },
            "columns": columns,
            "sort": {
                "sortBy": self.preset.sort_by,
                "sortOrder": if self.preset.ascending { "asc" } else { "desc" },
            },
            "range": [0, self.limit],
        })
    }
}

#[async_trait]
impl Fetcher for TradingViewScanner {
    fn name(&self) -> &str {
        self.preset.tag.label()
    }

    async fn fetch(&self) -> Result<Vec<RawRow>, FetchError> {
        let body = self
            .client
            .post(&self.url)
            .json(&self.request_body())
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        rows_from_response(self.preset, &body)
    }
}

/// Converts a scan API response into raw rows tagged with the preset's source.
///
/// Entries with no cells are skipped. When the ticker cell is missing the
/// ticker is taken from the `EXCHANGE:SYMBOL` id.
pub fn rows_from_response(preset: &ScanPreset, body: &Value) -> Result<Vec<RawRow>, FetchError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(FetchError::Api(message));
    }

    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::UnexpectedShape("scan response has no `data` array".to_string()))?;

    let mut rows = Vec::with_capacity(data.len());
    let mut skipped = 0;

    for entry in data {
        let cells = match entry.get("d").and_then(Value::as_array) {
            Some(cells) if !cells.is_empty() => cells,
            _ => {
                skipped += 1;
                continue;
            }
        };

        let mut row = RawRow::new(preset.tag);
        for (column, cell) in preset.columns.iter().zip(cells) {
            if let Some(text) = render_cell(column.format, cell) {
                row.insert(column.field, text);
            }
        }

        if row.text(fields::TICKER).is_none() {
            if let Some(symbol) = entry.get("s").and_then(Value::as_str) {
                row.insert(fields::TICKER, symbol_ticker(symbol));
            }
        }

        rows.push(row);
    }

    debug!(preset = preset.name, rows = rows.len(), skipped, "Mapped scan response");
    Ok(rows)
}

fn render_cell(format: CellFormat, cell: &Value) -> Option<String> {
    match (format, cell) {
        (CellFormat::Symbol, Value::String(symbol)) => Some(symbol_ticker(symbol)),
        (CellFormat::Percent, Value::Number(n)) => n.as_f64().map(|v| format!("{}%", v)),
        (CellFormat::Rating, Value::Number(n)) => n.as_f64().map(|v| rating_label(v).to_string()),
        (_, Value::String(text)) => Some(text.clone()),
        (_, Value::Number(n)) => n.as_f64().map(|v| format!("{}", v)),
        _ => None,
    }
}

/// `"NASDAQ:AAPL"` or `"AAPL\nApple Inc."` to `"AAPL"`.
fn symbol_ticker(symbol: &str) -> String {
    let symbol = symbol.rsplit(':').next().unwrap_or(symbol);
    symbol.split_whitespace().next().unwrap_or("").to_string()
}

/// Label for a recommendation mark, where 1 is a strong buy and 5 a strong sell.
pub fn rating_label(mark: f64) -> &'static str {
    match mark {
        m if m < 1.5 => "Strong buy",
        m if m < 2.5 => "Buy",
        m if m < 3.5 => "Neutral",
        m if m < 4.5 => "Sell",
        _ => "Strong sell",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SourceTag;
    use crate::sources::presets::{LARGE_CAP, LOSERS, OVERSOLD};
    use mockito::Matcher;

    fn scanner() -> TradingViewScanner {
        TradingViewScanner::new(reqwest::Client::new(), &OVERSOLD, 100)
    }

    #[test]
    fn test_request_body_follows_preset() {
        let body = scanner().request_body();

        assert_eq!(body["columns"][0], json!("name"));
        assert_eq!(body["columns"][1], json!("RSI"));
        assert_eq!(body["columns"].as_array().unwrap().len(), OVERSOLD.columns.len());
        assert_eq!(body["sort"]["sortBy"], json!("RSI"));
        assert_eq!(body["sort"]["sortOrder"], json!("asc"));
        assert_eq!(body["filter"][0]["operation"], json!("less"));
        assert_eq!(body["range"], json!([0, 100]));
    }

    #[test]
    fn test_rows_from_response() {
        let body = json!({
            "totalCount": 2,
            "data": [
                {
                    "s": "NYSE:BRK.B",
                    "d": ["BRK.B", 412.5, -1.25, 3_120_000, 1.4, 890_000_000_000.0,
                          9.1, 45.2, -12.5, null, "Finance", 2.1]
                },
                { "s": "NASDAQ:EMPTY", "d": [] }
            ]
        });

        let rows = rows_from_response(&LARGE_CAP, &body).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.source, vec![SourceTag::TradingViewLargeCap]);
        assert_eq!(row.text(fields::TICKER).as_deref(), Some("BRK.B"));
        assert_eq!(row.text(fields::PRICE).as_deref(), Some("412.5"));
        assert_eq!(row.text(fields::PERCENT_CHANGE).as_deref(), Some("-1.25%"));
        assert_eq!(row.text(fields::MARKET_CAP).as_deref(), Some("890000000000"));
        assert_eq!(row.text(fields::PE_RATIO_SECONDARY).as_deref(), Some("9.1"));
        assert_eq!(row.text(fields::EPS_DIL_GROWTH_TTM_YOY).as_deref(), Some("-12.5%"));
        assert_eq!(row.text(fields::DIV_YIELD_TTM), None);
        assert_eq!(row.text(fields::SECTOR).as_deref(), Some("Finance"));
        assert_eq!(row.text(fields::ANALYST_RATING).as_deref(), Some("Buy"));
    }

    #[test]
    fn test_ticker_falls_back_to_symbol_id() {
        let body = json!({ "data": [{ "s": "NASDAQ:ABCD", "d": [null, 12.0] }] });

        let rows = rows_from_response(&OVERSOLD, &body).unwrap();

        assert_eq!(rows[0].text(fields::TICKER).as_deref(), Some("ABCD"));
        assert_eq!(rows[0].text(fields::RSI_14).as_deref(), Some("12"));
    }

    #[test]
    fn test_api_error_and_bad_shape() {
        let error = rows_from_response(&OVERSOLD, &json!({ "error": "Unknown field" }));
        assert!(matches!(error, Err(FetchError::Api(message)) if message == "Unknown field"));

        let shape = rows_from_response(&OVERSOLD, &json!({ "rows": [] }));
        assert!(matches!(shape, Err(FetchError::UnexpectedShape(_))));
    }

    #[test]
    fn test_rating_labels() {
        assert_eq!(rating_label(1.0), "Strong buy");
        assert_eq!(rating_label(1.5), "Buy");
        assert_eq!(rating_label(3.0), "Neutral");
        assert_eq!(rating_label(4.2), "Sell");
        assert_eq!(rating_label(4.9), "Strong sell");
    }

    #[test]
    fn test_symbol_ticker() {
        assert_eq!(symbol_ticker("NASDAQ:AAPL"), "AAPL");
        assert_eq!(symbol_ticker("AAPL\nApple Inc."), "AAPL");
        assert_eq!(symbol_ticker("MSFT"), "MSFT");
    }

    fn losers_at(url: String) -> TradingViewScanner {
        TradingViewScanner::new(reqwest::Client::new(), &LOSERS, 2).with_url(url)
    }

    #[tokio::test]
    async fn test_fetch_posts_preset_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "range": [0, 2],
                "sort": { "sortBy": "change", "sortOrder": "asc" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "data": [{ "s": "NASDAQ:QQQ", "d": ["QQQ", 401.2, -2.5] }] }).to_string())
            .create_async()
            .await;

        let rows = losers_at(server.url()).fetch().await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, vec![SourceTag::TradingViewLosers]);
        assert_eq!(rows[0].text(fields::TICKER).as_deref(), Some("QQQ"));
        assert_eq!(rows[0].text(fields::PERCENT_CHANGE).as_deref(), Some("-2.5%"));
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/").with_status(500).create_async().await;

        let result = losers_at(server.url()).fetch().await;

        assert!(matches!(
            result,
            Err(FetchError::Http(error)) if error.status() == Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR)
        ));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("{\"data\": [")
            .create_async()
            .await;

        let result = losers_at(server.url()).fetch().await;

        assert!(matches!(result, Err(FetchError::Http(error)) if error.is_decode()));
    }
}
