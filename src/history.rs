//! Market-data provider integration
//!
//! Fetches raw daily closes for a ticker symbol and shapes them into the
//! bounded ascending `HistorySeries` the rest of the pipeline consumes.
//!
//! ## API Reference
//!
//! Endpoint: `{base_url}?function=TIME_SERIES_DAILY&symbol={symbol}&apikey={key}`
//! Returns: JSON object with a `"Time Series (Daily)"` mapping of ISO date
//! to an entry object whose `"4. close"` field is the close as a decimal
//! string. Rate-limit notes arrive as a top-level `"Note"`, invalid symbols
//! as `"Error Message"`.

use crate::config::Config;
use crate::error::{ForecastError, Result};
use crate::series::{HistorySeries, PricePoint};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Seam over the market-data provider. The orchestrator only sees this.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch the bounded ascending daily-close series for a symbol.
    ///
    /// No retry is performed here; the caller decides.
    async fn fetch(&self, symbol: &str) -> Result<HistorySeries>;
}

/// Daily time-series response envelope
#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<HashMap<String, serde_json::Value>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

/// One day's entry inside the time-series mapping
#[derive(Debug, Deserialize)]
struct DailyEntry {
    #[serde(rename = "4. close")]
    close: String,
}

/// HTTP client for an Alpha Vantage style daily time-series endpoint
pub struct AlphaVantageClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    history_cap: usize,
    timeout: Duration,
}

impl AlphaVantageClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(config, config.provider_base_url.clone())
    }

    /// Point the client at a different endpoint (tests, self-hosted mirrors)
    pub fn with_base_url(config: &Config, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            history_cap: config.history_cap,
            timeout: config.fetch_timeout,
        }
    }

    /// Shape a decoded provider response into a bounded ascending series.
    ///
    /// Entries with unparseable dates or closes are skipped; a response with
    /// no series mapping, or where every entry was skipped, is
    /// `DataUnavailable`.
    fn parse_response(&self, symbol: &str, response: DailyResponse) -> Result<HistorySeries> {
        let entries = match response.series {
            Some(entries) => entries,
            None => {
                let detail = response
                    .note
                    .or(response.error_message)
                    .unwrap_or_else(|| format!("no daily time series for {}", symbol));
                return Err(ForecastError::DataUnavailable(detail));
            }
        };

        let mut points = Vec::with_capacity(entries.len());
        for (date, value) in entries {
            match Self::parse_point(&date, value) {
                Some(point) => points.push(point),
                None => log::debug!("skipping malformed entry for {} at {}", symbol, date),
            }
        }

        let series = HistorySeries::from_unordered(points, self.history_cap);
        if series.is_empty() {
            return Err(ForecastError::DataUnavailable(format!(
                "no parseable closes for {}",
                symbol
            )));
        }

        Ok(series)
    }

    fn parse_point(date: &str, value: serde_json::Value) -> Option<PricePoint> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let entry: DailyEntry = serde_json::from_value(value).ok()?;
        let close = entry.close.trim().parse::<f64>().ok()?;
        Some(PricePoint { date, close })
    }
}

#[async_trait]
impl HistorySource for AlphaVantageClient {
    async fn fetch(&self, symbol: &str) -> Result<HistorySeries> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ForecastError::DataUnavailable(format!("provider request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ForecastError::DataUnavailable(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let decoded: DailyResponse = response
            .json()
            .await
            .map_err(|e| ForecastError::DataUnavailable(format!("provider body unreadable: {}", e)))?;

        let series = self.parse_response(symbol, decoded)?;
        log::info!(
            "📈 {} closes for {} ({} through {})",
            series.len(),
            symbol,
            series.oldest().map(|p| p.date.to_string()).unwrap_or_default(),
            series.newest().map(|p| p.date.to_string()).unwrap_or_default(),
        );
        Ok(series)
    }
}
