// =============================================================================
// Refresh Cycle: one fetch -> compute -> render pass
// =============================================================================
//
// Runs strictly sequentially: the index chart first, then each watched symbol
// in configured order. A failed fetch is recorded on the affected panel or
// card and the cycle moves on; nothing here returns an error.
// =============================================================================

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::MetricError;
use crate::market_clock::MarketClock;
use crate::market_data::MarketDataGateway;
use crate::metrics::{DisplayMetric, MetricKind};
use crate::presenter::{build_overlays, render_card, DashboardFrame, IndexPanel, SymbolCard};
use crate::runtime_config::RuntimeConfig;
use crate::types::{RefreshInterval, TimeRange, WatchedSymbol};

/// Immutable inputs of a single refresh cycle.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub clock: MarketClock,
    pub index: WatchedSymbol,
    pub watchlist: Vec<WatchedSymbol>,
    pub time_range: TimeRange,
    pub refresh_interval: RefreshInterval,
    pub ma_window: usize,
    pub ma_period: String,
    pub ma_interval: String,
    pub chart_ma_windows: Vec<usize>,
}

impl CycleContext {
    /// Capture the settings in `config` for a cycle starting at `now`.
    pub fn from_config(config: &RuntimeConfig, clock: MarketClock, now: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            started_at: now,
            clock,
            index: config.index.clone(),
            watchlist: config.watchlist.clone(),
            time_range: config.time_range,
            refresh_interval: config.refresh_interval,
            ma_window: config.ma_window,
            ma_period: config.ma_period.clone(),
            ma_interval: config.ma_interval.clone(),
            chart_ma_windows: config.chart_ma_windows.clone(),
        }
    }
}

/// Run one full cycle against `gateway`.
#[instrument(skip_all, fields(cycle_id = %ctx.cycle_id, range = %ctx.time_range))]
pub async fn run_cycle(gateway: &dyn MarketDataGateway, ctx: &CycleContext) -> DashboardFrame {
    let index = load_index(gateway, ctx).await;

    let mut cards = Vec::with_capacity(ctx.watchlist.len());
    for watched in &ctx.watchlist {
        let metric = load_metric(gateway, ctx, watched).await;
        let view = render_card(&metric);
        cards.push(SymbolCard { metric, view });
    }

    let failed = cards.iter().filter(|c| c.metric.is_empty()).count();
    info!(
        provider = gateway.id(),
        cards = cards.len(),
        failed,
        index_ok = index.error.is_none(),
        "refresh cycle complete"
    );

    DashboardFrame {
        cycle_id: ctx.cycle_id,
        generated_at: ctx.started_at.to_rfc3339(),
        generated_at_exchange: ctx.clock.exchange_time(&ctx.started_at),
        session: ctx.clock.session_state(&ctx.started_at),
        time_range: ctx.time_range,
        refresh_interval: ctx.refresh_interval,
        index,
        cards,
    }
}

async fn load_index(gateway: &dyn MarketDataGateway, ctx: &CycleContext) -> IndexPanel {
    let range = ctx.time_range;
    match gateway
        .fetch_bars(&ctx.index.symbol, range.period(), range.interval())
        .await
    {
        Ok(bars) => {
            let overlays = build_overlays(&bars, &ctx.chart_ma_windows);
            debug!(symbol = %ctx.index.symbol, bars = bars.len(), overlays = overlays.len(), "index loaded");
            IndexPanel {
                symbol: ctx.index.symbol.clone(),
                name: ctx.index.name.clone(),
                bars,
                overlays,
                error: None,
            }
        }
        Err(e) => {
            warn!(symbol = %ctx.index.symbol, error = %e, "index bars unavailable");
            IndexPanel {
                symbol: ctx.index.symbol.clone(),
                name: ctx.index.name.clone(),
                bars: Vec::new(),
                overlays: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

async fn load_metric(
    gateway: &dyn MarketDataGateway,
    ctx: &CycleContext,
    watched: &WatchedSymbol,
) -> DisplayMetric {
    let symbol = watched.symbol.as_str();

    let snapshot = gateway.fetch_snapshot(symbol).await;
    if let Err(e) = &snapshot {
        warn!(symbol, error = %e, "snapshot unavailable");
    }

    let history = gateway
        .fetch_bars(symbol, &ctx.ma_period, &ctx.ma_interval)
        .await;
    if let Err(e) = &history {
        warn!(symbol, error = %e, "moving-average history unavailable");
    }

    let metric = DisplayMetric::build(watched, &snapshot, &history, ctx.ma_window);

    for issue in &metric.issues {
        if let (MetricKind::MovingAverage, MetricError::InsufficientHistory { required, available }) =
            (issue.metric, &issue.error)
        {
            warn!(symbol, required, available, "not enough history for moving average");
        }
    }

    metric
}
