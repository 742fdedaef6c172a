//! Market data provider
//!
//! Price series come from the Yahoo Finance chart API, economic indicators
//! from FRED's fredgraph CSV export. Neither requires a credential; fetch
//! or parse failures are reported as "unavailable" (None/empty), never as
//! errors.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;
use tracing::{debug, error};

use crate::error::NewsletterError;
use crate::Result;

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const FREDGRAPH_CSV_URL: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";
const INDICATOR_LOOKBACK_DAYS: i64 = 90;

/// One daily close.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily close series for one ticker, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Latest and previous close; a single-point series repeats the latest.
    pub fn latest_and_prev(&self) -> Option<(f64, f64)> {
        let latest = self.points.last()?.close;
        let prev = if self.points.len() > 1 {
            self.points[self.points.len() - 2].close
        } else {
            latest
        };
        Some((latest, prev))
    }
}

/// Latest observation of one economic series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorReading {
    pub value: f64,
    pub as_of: NaiveDate,
}

/// Trait for the financial-data collaborator.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch a price series, or `None` when the data is unavailable.
    async fn fetch_series(&self, ticker: &str, range: &str, interval: &str)
        -> Option<PriceSeries>;

    /// Latest value per series id; unavailable series are simply absent.
    async fn latest_indicators(
        &self,
        series_ids: &[&str],
    ) -> BTreeMap<String, IndicatorReading>;
}

/// HTTP-backed provider combining Yahoo Finance and FRED.
pub struct MarketDataClient {
    http: Client,
}

impl MarketDataClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .pool_idle_timeout(StdDuration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(StdDuration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; newsletter-pipeline)")
            .build()
            .expect("Failed to build HTTP client");

        Self { http }
    }

    async fn fetch_series_inner(
        &self,
        ticker: &str,
        range: &str,
        interval: &str,
    ) -> Result<PriceSeries> {
        let url = format!(
            "{}/{}?range={}&interval={}",
            YAHOO_CHART_URL, ticker, range, interval
        );

        let response = self.http.get(&url).send().await.map_err(|e| {
            NewsletterError::transient_fetch(format!("Yahoo request failed for {}: {}", ticker, e))
        })?;

        if !response.status().is_success() {
            return Err(NewsletterError::transient_fetch(format!(
                "Yahoo returned {} for {}",
                response.status(),
                ticker
            )));
        }

        let body = response.text().await.map_err(|e| {
            NewsletterError::transient_fetch(format!("Yahoo body read failed for {}: {}", ticker, e))
        })?;

        parse_yahoo_chart(ticker, &body)
    }

    async fn fetch_indicator_inner(&self, series_id: &str) -> Result<IndicatorReading> {
        let start = (Utc::now() - Duration::days(INDICATOR_LOOKBACK_DAYS)).date_naive();
        let url = format!("{}?id={}&cosd={}", FREDGRAPH_CSV_URL, series_id, start);

        let response = self.http.get(&url).send().await.map_err(|e| {
            NewsletterError::transient_fetch(format!(
                "FRED request failed for {}: {}",
                series_id, e
            ))
        })?;

        if !response.status().is_success() {
            return Err(NewsletterError::transient_fetch(format!(
                "FRED returned {} for {}",
                response.status(),
                series_id
            )));
        }

        let body = response.text().await.map_err(|e| {
            NewsletterError::transient_fetch(format!(
                "FRED body read failed for {}: {}",
                series_id, e
            ))
        })?;

        parse_fredgraph_csv(&body).ok_or_else(|| {
            NewsletterError::fatal_fetch(format!("No observations for FRED series {}", series_id))
        })
    }
}

impl Default for MarketDataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MarketDataClient {
    async fn fetch_series(
        &self,
        ticker: &str,
        range: &str,
        interval: &str,
    ) -> Option<PriceSeries> {
        match self.fetch_series_inner(ticker, range, interval).await {
            Ok(series) => {
                debug!(ticker = %ticker, rows = series.points.len(), "Fetched price series");
                Some(series)
            }
            Err(e) => {
                error!(ticker = %ticker, "Failed to fetch price series: {}", e);
                None
            }
        }
    }

    async fn latest_indicators(
        &self,
        series_ids: &[&str],
    ) -> BTreeMap<String, IndicatorReading> {
        let mut readings = BTreeMap::new();

        for series_id in series_ids {
            match self.fetch_indicator_inner(series_id).await {
                Ok(reading) => {
                    readings.insert(series_id.to_string(), reading);
                }
                Err(e) => {
                    error!(series = %series_id, "Failed to fetch indicator: {}", e);
                }
            }
        }

        readings
    }
}

/// Decode the Yahoo v8 chart payload into a close-price series.
fn parse_yahoo_chart(ticker: &str, body: &str) -> Result<PriceSeries> {
    let decoded: YahooChartResponse = serde_json::from_str(body).map_err(|e| {
        NewsletterError::fatal_fetch(format!("Invalid Yahoo response for {}: {}", ticker, e))
    })?;

    let result = decoded
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| {
            NewsletterError::fatal_fetch(format!("Empty Yahoo chart result for {}", ticker))
        })?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let points = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PricePoint { date, close })
        })
        .collect();

    Ok(PriceSeries {
        ticker: ticker.to_string(),
        points,
    })
}

/// Latest parseable observation from a fredgraph CSV export.
/// Missing observations are marked "." and skipped.
fn parse_fredgraph_csv(body: &str) -> Option<IndicatorReading> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());

    let mut latest = None;
    for record in reader.records().flatten() {
        let date = record.get(0).and_then(|d| d.parse::<NaiveDate>().ok());
        let value = record.get(1).and_then(|v| v.trim().parse::<f64>().ok());
        if let (Some(as_of), Some(value)) = (date, value) {
            latest = Some(IndicatorReading { value, as_of });
        }
    }

    latest
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooChartResult>>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
