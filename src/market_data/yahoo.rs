// =============================================================================
// Yahoo Finance REST client: chart and quoteSummary endpoints
// =============================================================================
//
// Bars and snapshots come from the public chart endpoint, which needs no
// authentication. Market cap only exists on quoteSummary, which requires a
// cookie + crumb pair; the pair is cached on the client and dropped on 401.
// A market-cap failure never fails the snapshot.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::RwLock;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

use crate::errors::FetchError;
use crate::market_data::{Bar, MarketDataGateway, Snapshot};
use crate::runtime_config::ProviderConfig;

/// Longest provider error body kept in a `FetchError::Status`.
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Clone)]
struct Crumb {
    cookie: String,
    value: String,
}

/// Yahoo Finance client implementing [`MarketDataGateway`].
pub struct YahooClient {
    base_url: String,
    /// Hands out the session cookie quoteSummary expects.
    cookie_url: String,
    client: reqwest::Client,
    crumb: RwLock<Option<Crumb>>,
}

impl YahooClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&config.user_agent)
            .with_context(|| format!("invalid user agent '{}'", config.user_agent))?;
        default_headers.insert(header::USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %config.base_url, "YahooClient initialised");

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie_url: config.cookie_url.clone(),
            client,
            crumb: RwLock::new(None),
        })
    }

    // -------------------------------------------------------------------------
    // HTTP helpers
    // -------------------------------------------------------------------------

    fn chart_url(&self, symbol: &str, period: &str, interval: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}?range={}&interval={}",
            self.base_url,
            encode(symbol),
            encode(period),
            encode(interval)
        )
    }

    /// GET `url` and return the body, mapping non-2xx statuses to
    /// `FetchError::Status`.
    async fn get_text(&self, url: &str, cookie: Option<&str>) -> Result<String, FetchError> {
        let mut req = self.client.get(url);
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }
        Ok(body)
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<ChartSeries, FetchError> {
        let url = self.chart_url(symbol, period, interval);
        let body = self.get_text(&url, None).await?;
        parse_chart(symbol, &body)
    }

    // -------------------------------------------------------------------------
    // Crumb handling
    // -------------------------------------------------------------------------

    async fn ensure_crumb(&self) -> Result<Crumb, FetchError> {
        let cached = self.crumb.read().clone();
        if let Some(c) = cached {
            return Ok(c);
        }

        let resp = self.client.get(&self.cookie_url).send().await?;
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(';').next())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FetchError::Provider("no session cookie issued".into()))?;

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let value = self.get_text(&url, Some(&cookie)).await?.trim().to_string();
        if value.is_empty() {
            return Err(FetchError::Provider("empty crumb".into()));
        }

        let crumb = Crumb { cookie, value };
        *self.crumb.write() = Some(crumb.clone());
        debug!("quoteSummary crumb refreshed");
        Ok(crumb)
    }

    /// Market capitalisation from quoteSummary/summaryDetail.
    #[instrument(skip(self), name = "yahoo::fetch_market_cap")]
    async fn fetch_market_cap(&self, symbol: &str) -> Result<Option<f64>, FetchError> {
        let crumb = self.ensure_crumb().await?;
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules=summaryDetail&crumb={}",
            self.base_url,
            encode(symbol),
            encode(&crumb.value)
        );

        match self.get_text(&url, Some(&crumb.cookie)).await {
            Ok(body) => parse_market_cap(&body),
            Err(FetchError::Status { status: 401, body }) => {
                *self.crumb.write() = None;
                Err(FetchError::Status { status: 401, body })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MarketDataGateway for YahooClient {
    fn id(&self) -> &'static str {
        "YAHOO"
    }

    #[instrument(skip(self), name = "yahoo::fetch_bars")]
    async fn fetch_bars(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<Bar>, FetchError> {
        let series = self.fetch_chart(symbol, period, interval).await?;
        if series.bars.is_empty() {
            return Err(FetchError::EmptyResult {
                symbol: symbol.to_string(),
            });
        }
        debug!(symbol, period, interval, count = series.bars.len(), "bars fetched");
        Ok(series.bars)
    }

    #[instrument(skip(self), name = "yahoo::fetch_snapshot")]
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot, FetchError> {
        let series = self.fetch_chart(symbol, "1d", "1d").await?;
        let mut snapshot = snapshot_from_chart(symbol, &series)?;

        match self.fetch_market_cap(symbol).await {
            Ok(cap) => snapshot.market_cap = cap,
            Err(e) => warn!(symbol, error = %e, "market cap unavailable"),
        }

        debug!(symbol, price = snapshot.last_price, "snapshot fetched");
        Ok(snapshot)
    }
}

impl std::fmt::Debug for YahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooClient")
            .field("base_url", &self.base_url)
            .field("crumb", &self.crumb.read().as_ref().map(|_| "<cached>"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Response models
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryEnvelope {
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    summary_detail: Option<SummaryDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    market_cap: Option<RawValue>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`, or `{}` when absent.
#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

/// Bars plus the scalar fields the chart endpoint carries in `meta`.
#[derive(Debug)]
struct ChartSeries {
    meta: ChartMeta,
    bars: Vec<Bar>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn provider_error(err: ProviderErrorBody) -> FetchError {
    FetchError::Provider(format!(
        "{}: {}",
        err.code.unwrap_or_else(|| "unknown".into()),
        err.description.unwrap_or_default()
    ))
}

/// Parse a chart response. Rows where any of open/high/low/close is null are
/// dropped; a null volume counts as zero.
fn parse_chart(symbol: &str, body: &str) -> Result<ChartSeries, FetchError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("chart response for {symbol}: {e}")))?;

    if let Some(err) = envelope.chart.error {
        return Err(provider_error(err));
    }

    let result = envelope
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| FetchError::EmptyResult {
            symbol: symbol.to_string(),
        })?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
        ) else {
            continue;
        };
        let Some(timestamp) = Utc.timestamp_opt(ts, 0).single() else {
            warn!(symbol, ts, "skipping bar with invalid timestamp");
            continue;
        };
        let volume = field(&quote.volume).map(to_volume).unwrap_or(0);
        bars.push(Bar::new(timestamp, open, high, low, close, volume));
    }
    bars.sort_by_key(|b| b.timestamp);

    Ok(ChartSeries {
        meta: result.meta,
        bars,
    })
}

fn snapshot_from_chart(symbol: &str, series: &ChartSeries) -> Result<Snapshot, FetchError> {
    let last = series.bars.last();
    let last_price = last
        .map(|b| b.close)
        .or(series.meta.regular_market_price)
        .ok_or_else(|| FetchError::EmptyResult {
            symbol: symbol.to_string(),
        })?;

    Ok(Snapshot {
        symbol: symbol.to_string(),
        last_price,
        previous_close: series
            .meta
            .previous_close
            .or(series.meta.chart_previous_close),
        volume: last
            .map(|b| b.volume)
            .or_else(|| series.meta.regular_market_volume.map(to_volume)),
        market_cap: None,
    })
}

fn parse_market_cap(body: &str) -> Result<Option<f64>, FetchError> {
    let envelope: QuoteSummaryEnvelope = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("quoteSummary response: {e}")))?;

    if let Some(err) = envelope.quote_summary.error {
        return Err(provider_error(err));
    }

    Ok(envelope
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .and_then(|r| r.summary_detail)
        .and_then(|d| d.market_cap)
        .and_then(|m| m.raw))
}

fn to_volume(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 {
        v.round() as u64
    } else {
        0
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
