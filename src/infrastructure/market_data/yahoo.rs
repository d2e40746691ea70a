use crate::domain::market::Candle;
use crate::domain::ports::MarketDataService;
use crate::infrastructure::core::http_client_factory::{
    HttpClientFactory, build_url_with_query, url_encode,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Daily bars from the Yahoo Finance chart endpoint.
pub struct YahooMarketDataService {
    client: ClientWithMiddleware,
    base_url: String,
}

impl YahooMarketDataService {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(DEFAULT_CHART_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: HttpClientFactory::create_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_chart(&self, symbol: &str, period1: i64, period2: i64) -> Result<Vec<Candle>> {
        let url = format!("{}/{}", self.base_url, url_encode(symbol));
        let query = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];
        let url_with_query = build_url_with_query(&url, &query);

        debug!("YahooMarketDataService: fetching {} ({}..{})", symbol, period1, period2);

        let response = self
            .client
            .get(&url_with_query)
            .send()
            .await
            .with_context(|| format!("Failed to fetch chart for {}", symbol))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "YahooMarketDataService: API error {} for {}: {}",
                status, symbol, error_text
            );
            anyhow::bail!("Yahoo chart API error ({}): {}", status, error_text);
        }

        let body: ChartResponse = response
            .json()
            .await
            .context("Failed to parse chart response")?;

        body.into_candles(symbol)
    }
}

#[async_trait]
impl MarketDataService for YahooMarketDataService {
    async fn daily_history(&self, symbol: &str, lookback_days: i64) -> Result<Vec<Candle>> {
        let now = Utc::now();
        let start = now - ChronoDuration::days(lookback_days.max(1));
        self.fetch_chart(symbol, start.timestamp(), now.timestamp())
            .await
    }

    async fn daily_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Candle>> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .context("Invalid start date")?;
        // period2 is exclusive
        let period2 = (end + ChronoDuration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .context("Invalid end date")?;
        self.fetch_chart(symbol, period1, period2).await
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResponse {
    /// Flattens the columnar payload, skipping bars without a close.
    fn into_candles(self, symbol: &str) -> Result<Vec<Candle>> {
        if let Some(err) = self.chart.error {
            anyhow::bail!(
                "Yahoo chart error for {}: {} {}",
                symbol,
                err.code.unwrap_or_default(),
                err.description.unwrap_or_default()
            );
        }

        let Some(result) = self.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(Vec::new());
        };
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

        let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

        let candles = result
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let close = at(&quote.close, i)?;
                Some(Candle {
                    symbol: symbol.to_string(),
                    timestamp: *ts,
                    open: at(&quote.open, i).unwrap_or(close),
                    high: at(&quote.high, i).unwrap_or(close),
                    low: at(&quote.low, i).unwrap_or(close),
                    close,
                    volume: at(&quote.volume, i).unwrap_or(0.0),
                })
            })
            .collect();

        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_payload_parsing_skips_null_closes() {
        let payload = r#"{
            "chart": {
                "result": [{
                    "meta": {"symbol": "SPY"},
                    "timestamp": [1700000000, 1700086400, 1700172800],
                    "indicators": {"quote": [{
                        "open": [100.0, null, 102.0],
                        "high": [101.0, null, 103.0],
                        "low": [99.0, null, 101.0],
                        "close": [100.5, null, 102.5],
                        "volume": [1000, null, 1200]
                    }]}
                }],
                "error": null
            }
        }"#;
        let response: ChartResponse = serde_json::from_str(payload).unwrap();
        let candles = response.into_candles("SPY").unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 102.5);
        assert_eq!(candles[1].volume, 1200.0);
    }

    #[test]
    fn test_chart_error_is_reported() {
        let payload = r#"{"chart": {"result": null,
            "error": {"code": "Not Found", "description": "No data found"}}}"#;
        let response: ChartResponse = serde_json::from_str(payload).unwrap();
        let err = response.into_candles("NOPE").unwrap_err();
        assert!(err.to_string().contains("No data found"));
    }
}
