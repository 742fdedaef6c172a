//! Market data augmentation
//!
//! Builds an optional, data-driven newsletter section from live market
//! data: an index snapshot, a volatility-trend chart, and a handful of
//! economic indicators. The whole component is one isolated failure
//! domain; the orchestrator catches any error here and skips the section.

pub mod charts;
pub mod data;

pub use charts::{ChartRenderer, LineChartRenderer};
pub use data::{IndicatorReading, MarketDataClient, MarketDataProvider, PricePoint, PriceSeries};

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::NewsletterError;
use crate::models::{RequestContext, SectionDraft};
use crate::Result;

const SECTION_TITLE: &str = "Markets at a Glance";
const VOLATILITY_TICKER: &str = "^VIX";
const SNAPSHOT_RANGE: &str = "5d";
const TREND_RANGE: &str = "1mo";
const INTERVAL: &str = "1d";

/// Keyword-routed ticker group; first match against the topic wins.
struct TickerGroup {
    keywords: &'static [&'static str],
    tickers: &'static [&'static str],
}

// Fixed priority order: crypto, bonds, technology, energy.
const TICKER_GROUPS: &[TickerGroup] = &[
    TickerGroup {
        keywords: &["crypto", "bitcoin", "ethereum", "blockchain", "defi"],
        tickers: &["BTC-USD", "ETH-USD"],
    },
    TickerGroup {
        keywords: &["bond", "treasury", "yield", "fixed income", "interest rate"],
        tickers: &["^TNX", "TLT"],
    },
    TickerGroup {
        keywords: &["tech", "software", "semiconductor", "ai "],
        tickers: &["^IXIC", "QQQ"],
    },
    TickerGroup {
        keywords: &["energy", "oil", "gas", "renewable"],
        tickers: &["XLE", "CL=F"],
    },
];

const DEFAULT_TICKERS: &[&str] = &["^GSPC", "^DJI", "^IXIC"];

/// Indicator series in display order.
const INDICATORS: &[(&str, &str)] = &[
    ("DGS10", "10Y Treasury Yield"),
    ("DFF", "Fed Funds Rate"),
    ("UNRATE", "Unemployment Rate"),
    ("CPIAUCSL", "CPI"),
];

fn display_name(ticker: &str) -> &str {
    match ticker {
        "^GSPC" => "S&P 500",
        "^DJI" => "Dow Jones",
        "^IXIC" => "Nasdaq",
        "^VIX" => "VIX",
        "^TNX" => "10Y Treasury Note",
        "BTC-USD" => "Bitcoin",
        "ETH-USD" => "Ethereum",
        "TLT" => "20+ Year Treasury ETF",
        "QQQ" => "Nasdaq 100 ETF",
        "XLE" => "Energy Select Sector ETF",
        "CL=F" => "Crude Oil",
        other => other,
    }
}

/// Volatility index plus the first keyword-matched ticker group, falling
/// back to broad-market indices.
pub fn select_tickers(topic: &str) -> Vec<&'static str> {
    let lowered = topic.to_lowercase();

    let group = TICKER_GROUPS
        .iter()
        .find(|g| g.keywords.iter().any(|k| lowered.contains(k)))
        .map(|g| g.tickers)
        .unwrap_or(DEFAULT_TICKERS);

    let mut tickers = vec![VOLATILITY_TICKER];
    tickers.extend_from_slice(group);
    tickers
}

struct SnapshotRow {
    name: &'static str,
    latest_close: f64,
    change_pct: f64,
}

pub struct MarketDataAugmenter {
    provider: Arc<dyn MarketDataProvider>,
    charts: Arc<dyn ChartRenderer>,
}

impl MarketDataAugmenter {
    pub fn new(provider: Arc<dyn MarketDataProvider>, charts: Arc<dyn ChartRenderer>) -> Self {
        Self { provider, charts }
    }

    /// Build the market section for this run's topic.
    ///
    /// The section carries no citation URLs; its provenance is the data
    /// collaborator itself.
    pub async fn augment(&self, ctx: &RequestContext) -> Result<SectionDraft> {
        let tickers = select_tickers(&ctx.topic);

        let mut snapshot = Vec::new();
        for ticker in &tickers {
            let Some(series) = self
                .provider
                .fetch_series(ticker, SNAPSHOT_RANGE, INTERVAL)
                .await
            else {
                continue;
            };
            let Some((latest_close, prev_close)) = series.latest_and_prev() else {
                continue;
            };

            let change_pct = if prev_close != 0.0 {
                (latest_close - prev_close) / prev_close * 100.0
            } else {
                0.0
            };

            snapshot.push(SnapshotRow {
                name: display_name(ticker),
                latest_close,
                change_pct,
            });
        }

        let chart_uri = match self
            .provider
            .fetch_series(VOLATILITY_TICKER, TREND_RANGE, INTERVAL)
            .await
        {
            Some(series) => self
                .charts
                .render_line_chart(&series, "CBOE Volatility Index (VIX)"),
            None => None,
        };
        if chart_uri.is_none() {
            warn!("Volatility chart unavailable; the market section will omit it");
        }

        let indicator_ids: Vec<&str> = INDICATORS.iter().map(|(id, _)| *id).collect();
        let readings = self.provider.latest_indicators(&indicator_ids).await;

        if snapshot.is_empty() && readings.is_empty() {
            return Err(NewsletterError::fatal_fetch(
                "No market data available for the snapshot or indicators",
            ));
        }

        info!(
            snapshot_rows = snapshot.len(),
            indicators = readings.len(),
            chart = chart_uri.is_some(),
            "Market section assembled"
        );

        let html = build_section_html(&snapshot, chart_uri.as_deref(), &readings);

        Ok(SectionDraft {
            title: SECTION_TITLE.to_string(),
            html,
            sources: Vec::new(),
        })
    }
}

fn build_section_html(
    snapshot: &[SnapshotRow],
    chart_uri: Option<&str>,
    readings: &std::collections::BTreeMap<String, IndicatorReading>,
) -> String {
    let mut html = String::new();

    if !snapshot.is_empty() {
        html.push_str("<h3>Market Snapshot</h3>\n<ul>\n");
        for row in snapshot {
            let sign = if row.change_pct >= 0.0 { "+" } else { "" };
            html.push_str(&format!(
                "  <li><strong>{}</strong>: {:.2} ({}{:.2}%)</li>\n",
                escape_html(row.name),
                row.latest_close,
                sign,
                row.change_pct
            ));
        }
        html.push_str("</ul>\n");
    }

    if let Some(uri) = chart_uri {
        html.push_str(&format!(
            "<img src=\"{}\" alt=\"VIX price trend\" style=\"max-width: 100%; height: auto;\">\n",
            uri
        ));
    }

    // Display order follows the configured indicator list, not map order.
    let ordered: Vec<_> = INDICATORS
        .iter()
        .filter_map(|(id, name)| readings.get(*id).map(|r| (*name, r)))
        .collect();

    if !ordered.is_empty() {
        html.push_str("<h3>Economic Indicators</h3>\n<ul>\n");
        for (name, reading) in ordered {
            html.push_str(&format!(
                "  <li><strong>{}</strong>: {:.2} (as of {})</li>\n",
                escape_html(name),
                reading.value,
                reading.as_of
            ));
        }
        html.push_str("</ul>\n");
    }

    html
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
