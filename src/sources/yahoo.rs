use crate::data::ingestion::fields;
use crate::data::{FetchError, Fetcher, RawRow, SourceTag};
use async_trait::async_trait;
use serde_json::Value;

pub const SCREENER_URL: &str = "https://query1.finance.yahoo.com/v1/finance/screener/predefined/saved";

/// Quote keys of the screener response and the raw field each one feeds.
const QUOTE_FIELDS: [(&str, &str); 10] = [
    ("symbol", fields::TICKER),
    ("shortName", fields::NAME),
    ("regularMarketPrice", fields::PRICE),
    ("regularMarketChange", fields::CHANGE),
    ("regularMarketChangePercent", fields::PERCENT_CHANGE),
    ("regularMarketVolume", fields::VOLUME),
    ("averageDailyVolume3Month", fields::AVG_VOLUME),
    ("marketCap", fields::MARKET_CAP),
    ("trailingPE", fields::PE_RATIO),
    ("fiftyTwoWeekChangePercent", fields::FIFTY_TWO_WEEK_CHANGE),
];

/// Fetches a predefined Yahoo Finance screener, the primary quote table.
///
/// The screener is requested in formatted mode, so most cells arrive as
/// `{ "raw": 128682000, "fmt": "128.682M" }`; the formatted text is kept as
/// the raw value, matching what the rendered table shows.
pub struct YahooScreener {
    client: reqwest::Client,
    screener_id: String,
    count: usize,
    url: String,
}

impl YahooScreener {
    /// Creates a fetcher for the predefined screener `screener_id`, asking for
    /// `count` quotes.
    pub fn new(client: reqwest::Client, screener_id: impl Into<String>, count: usize) -> Self {
        Self {
            client,
            screener_id: screener_id.into(),
            count,
            url: SCREENER_URL.to_string(),
        }
    }

    /// The day's biggest losers.
    pub fn day_losers(client: reqwest::Client, count: usize) -> Self {
        Self::new(client, "day_losers", count)
    }

    /// Points the screener at another endpoint, e.g. a local mirror.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl Fetcher for YahooScreener {
    fn name(&self) -> &str {
        SourceTag::YahooLosers.label()
    }

    async fn fetch(&self) -> Result<Vec<RawRow>, FetchError> {
        let count = self.count.to_string();
        let body = self
            .client
            .get(&self.url)
            .query(&[
                ("formatted", "true"),
                ("scrIds", self.screener_id.as_str()),
                ("count", count.as_str()),
                ("start", "0"),
                ("lang", "en-US"),
                ("region", "US"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        rows_from_response(&body)
    }
}

/// Converts a screener response into raw rows tagged as the primary source.
pub fn rows_from_response(body: &Value) -> Result<Vec<RawRow>, FetchError> {
    let finance = body
        .get("finance")
        .ok_or_else(|| FetchError::UnexpectedShape("screener response has no `finance` object".to_string()))?;

    if let Some(error) = finance.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(FetchError::Api(message));
    }

    let quotes = finance
        .get("result")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .and_then(|result| result.get("quotes"))
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::UnexpectedShape("screener result has no `quotes` array".to_string()))?;

    let rows = quotes
        .iter()
        .map(|quote| {
            let mut row = RawRow::new(SourceTag::YahooLosers);
            for (key, field) in QUOTE_FIELDS {
                if let Some(value) = cell_value(quote.get(key)) {
                    row.insert(field, value);
                }
            }
            if row.text(fields::NAME).is_none() {
                if let Some(name) = cell_value(quote.get("longName")) {
                    row.insert(fields::NAME, name);
                }
            }
            row
        })
        .collect();

    Ok(rows)
}

/// Formatted text of a `{raw, fmt}` cell, the raw value if there is no text,
/// or the plain value.
fn cell_value(cell: Option<&Value>) -> Option<Value> {
    match cell? {
        Value::Object(formatted) => formatted
            .get("fmt")
            .or_else(|| formatted.get("raw"))
            .filter(|value| !value.is_null())
            .cloned(),
        Value::Null => None,
        value => Some(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalize;
    use mockito::Matcher;
    use serde_json::json;

    fn screener_body(quotes: Value) -> Value {
        json!({ "finance": { "result": [{ "count": 1, "quotes": quotes }], "error": null } })
    }

    #[test]
    fn test_formatted_quote_to_row() {
        let body = screener_body(json!([{
            "symbol": "XYZ",
            "shortName": "XYZ Therapeutics",
            "regularMarketPrice": { "raw": 4.12, "fmt": "4.12" },
            "regularMarketChange": { "raw": -1.93, "fmt": "-1.93" },
            "regularMarketChangePercent": { "raw": -31.9, "fmt": "-31.90%" },
            "regularMarketVolume": { "raw": 18_400_000, "fmt": "18.4M" },
            "averageDailyVolume3Month": { "raw": 950_000, "fmt": "950k" },
            "marketCap": { "raw": 128_682_000, "fmt": "128.682M" },
            "trailingPE": { "raw": 11.2, "fmt": "11.20" },
            "fiftyTwoWeekChangePercent": { "raw": -54.3, "fmt": "-54.30%" }
        }]));

        let rows = rows_from_response(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, vec![SourceTag::YahooLosers]);
        assert_eq!(rows[0].text(fields::MARKET_CAP).as_deref(), Some("128.682M"));

        let record = normalize(&rows[0]);
        assert_eq!(record.ticker, "XYZ");
        assert_eq!(record.name.as_deref(), Some("XYZ Therapeutics"));
        assert_eq!(record.price, Some(4.12));
        assert_eq!(record.change, Some(-1.93));
        assert_eq!(record.percent_change, Some(-31.9));
        assert_eq!(record.avg_volume, Some(950_000.0));
        assert_eq!(record.market_cap, Some(128.682 * 1_000_000.0));
        assert_eq!(record.pe_ratio, Some(11.2));
        assert_eq!(record.fifty_two_week_change, Some(-54.3));
    }

    #[test]
    fn test_plain_values_and_long_name_fallback() {
        let body = screener_body(json!([{
            "symbol": "ABC",
            "longName": "ABC Incorporated",
            "regularMarketPrice": 21.5,
            "marketCap": null,
            "trailingPE": { "raw": 8.4 }
        }]));

        let rows = rows_from_response(&body).unwrap();

        assert_eq!(rows[0].text(fields::NAME).as_deref(), Some("ABC Incorporated"));
        assert_eq!(rows[0].text(fields::PRICE).as_deref(), Some("21.5"));
        assert_eq!(rows[0].text(fields::MARKET_CAP), None);
        assert_eq!(rows[0].text(fields::PE_RATIO).as_deref(), Some("8.4"));
    }

    #[test]
    fn test_api_error() {
        let body = json!({
            "finance": { "result": null, "error": { "code": "Bad Request", "description": "Invalid scrIds" } }
        });

        let result = rows_from_response(&body);

        assert!(matches!(result, Err(FetchError::Api(message)) if message == "Invalid scrIds"));
    }

    #[test]
    fn test_missing_quotes() {
        let result = rows_from_response(&json!({ "finance": { "result": [], "error": null } }));
        assert!(matches!(result, Err(FetchError::UnexpectedShape(_))));
    }

    fn screener_at(url: String) -> YahooScreener {
        YahooScreener::day_losers(reqwest::Client::new(), 25).with_url(url)
    }

    #[tokio::test]
    async fn test_fetch_requests_formatted_screener() {
        let mut server = mockito::Server::new_async().await;
        let body = screener_body(json!([{ "symbol": "XYZ", "marketCap": { "raw": 2.1e9, "fmt": "2.1B" } }]));
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("formatted".into(), "true".into()),
                Matcher::UrlEncoded("scrIds".into(), "day_losers".into()),
                Matcher::UrlEncoded("count".into(), "25".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let rows = screener_at(server.url()).fetch().await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(fields::TICKER).as_deref(), Some("XYZ"));
        assert_eq!(rows[0].text(fields::MARKET_CAP).as_deref(), Some("2.1B"));
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let result = screener_at(server.url()).fetch().await;

        assert!(matches!(
            result,
            Err(FetchError::Http(error)) if error.status() == Some(reqwest::StatusCode::INTERNAL_SERVER_ERROR)
        ));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("Will be right back...")
            .create_async()
            .await;

        let result = screener_at(server.url()).fetch().await;

        assert!(matches!(result, Err(FetchError::Http(error)) if error.is_decode()));
    }
}
