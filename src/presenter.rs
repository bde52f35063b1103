// =============================================================================
// Presenter: dashboard frame types and pure render functions
// =============================================================================
//
// A `DashboardFrame` is everything the frontend draws for one refresh cycle.
// It is built once, wrapped in an `Arc`, and never mutated afterwards.
// =============================================================================

use serde::Serialize;
use uuid::Uuid;

use crate::market_data::{closes, Bar};
use crate::metrics::{format_magnitude, moving_average_series, DisplayMetric};
use crate::types::{RefreshInterval, SessionState, TimeRange};

/// Shown on a card whose price could not be fetched.
pub const NO_DATA: &str = "No data";

// =============================================================================
// Frame types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardFrame {
    pub cycle_id: Uuid,
    /// UTC, RFC 3339.
    pub generated_at: String,
    /// Exchange local time, `YYYY-MM-DD HH:MM:SS ET`.
    pub generated_at_exchange: String,
    pub session: SessionState,
    pub time_range: TimeRange,
    pub refresh_interval: RefreshInterval,
    pub index: IndexPanel,
    pub cards: Vec<SymbolCard>,
}

impl DashboardFrame {
    /// Every fetch or metric failure in this frame, as `symbol: message`.
    pub fn issue_messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(err) = &self.index.error {
            out.push(format!("{}: {}", self.index.symbol, err));
        }
        for card in &self.cards {
            for issue in &card.metric.issues {
                out.push(format!("{}: {:?} {}", card.metric.symbol, issue.metric, issue.error));
            }
        }
        out
    }
}

/// Candlestick data for the index chart.
#[derive(Debug, Clone, Serialize)]
pub struct IndexPanel {
    pub symbol: String,
    pub name: String,
    pub bars: Vec<Bar>,
    pub overlays: Vec<MaOverlay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Moving-average line aligned index-for-index with `IndexPanel::bars`.
#[derive(Debug, Clone, Serialize)]
pub struct MaOverlay {
    pub window: usize,
    pub label: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolCard {
    pub metric: DisplayMetric,
    pub view: CardView,
}

/// Colour hint for a signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Unknown,
}

impl Direction {
    fn of(value: Option<f64>) -> Self {
        match value {
            Some(v) if v >= 0.0 => Self::Up,
            Some(_) => Self::Down,
            None => Self::Unknown,
        }
    }
}

/// Text exactly as drawn on a summary card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub symbol: String,
    pub name: String,
    pub price: String,
    pub change: Option<String>,
    pub change_direction: Direction,
    pub moving_average: Option<String>,
    pub deviation: Option<String>,
    pub deviation_direction: Direction,
    pub volume: String,
    pub market_cap: String,
}

// =============================================================================
// Render functions
// =============================================================================

fn signed_percent(v: f64) -> String {
    format!("{v:+.2}%")
}

/// Render the text of one summary card.
pub fn render_card(metric: &DisplayMetric) -> CardView {
    CardView {
        symbol: metric.symbol.clone(),
        name: metric.name.clone(),
        price: metric
            .price
            .map(|p| format!("${p:.3}"))
            .unwrap_or_else(|| NO_DATA.to_string()),
        change: metric.percent_change_vs_prev_close.map(signed_percent),
        change_direction: Direction::of(metric.percent_change_vs_prev_close),
        moving_average: metric
            .ma20_value
            .map(|v| format!("MA{}: ${v:.3}", metric.ma_window)),
        deviation: metric.percent_deviation_vs_ma20.map(signed_percent),
        deviation_direction: Direction::of(metric.percent_deviation_vs_ma20),
        volume: format_magnitude(metric.volume.map(|v| v as f64)),
        market_cap: format_magnitude(metric.market_cap),
    }
}

/// Overlays for each window in `windows` that is strictly shorter than the
/// series.
pub fn build_overlays(bars: &[Bar], windows: &[usize]) -> Vec<MaOverlay> {
    let closes = closes(bars);
    windows
        .iter()
        .copied()
        .filter(|&w| w > 0 && bars.len() > w)
        .map(|w| MaOverlay {
            window: w,
            label: format!("MA{w}"),
            values: moving_average_series(&closes, w),
        })
        .collect()
}
