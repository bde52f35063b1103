// =============================================================================
// DisplayMetric: per-symbol values handed to the presenter
// =============================================================================
//
// Built once per refresh cycle from whatever the gateway returned. Every
// metric left as `None` has a matching `MetricIssue` explaining why.
// =============================================================================

use serde::Serialize;

use crate::errors::{FetchError, MetricError};
use crate::market_data::{Bar, Snapshot};
use crate::metrics::{moving_average, percent_change, percent_deviation};
use crate::types::WatchedSymbol;

/// Which value on a card an issue refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Price,
    PercentChange,
    MovingAverage,
    Deviation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricIssue {
    pub metric: MetricKind,
    pub error: MetricError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayMetric {
    pub symbol: String,
    pub name: String,
    pub price: Option<f64>,
    pub percent_change_vs_prev_close: Option<f64>,
    pub ma_window: usize,
    pub ma20_value: Option<f64>,
    pub percent_deviation_vs_ma20: Option<f64>,
    pub volume: Option<u64>,
    pub market_cap: Option<f64>,
    pub issues: Vec<MetricIssue>,
}

impl DisplayMetric {
    /// Derive the card values for `watched`.
    ///
    /// `snapshot` drives price and change vs previous close. `history` is the
    /// daily series used for the moving average; deviation is measured from
    /// its latest close.
    pub fn build(
        watched: &WatchedSymbol,
        snapshot: &Result<Snapshot, FetchError>,
        history: &Result<Vec<Bar>, FetchError>,
        ma_window: usize,
    ) -> Self {
        let mut metric = Self {
            symbol: watched.symbol.clone(),
            name: watched.name.clone(),
            price: None,
            percent_change_vs_prev_close: None,
            ma_window,
            ma20_value: None,
            percent_deviation_vs_ma20: None,
            volume: None,
            market_cap: None,
            issues: Vec::new(),
        };

        match snapshot {
            Ok(snap) => {
                metric.price = Some(snap.last_price);
                metric.volume = snap.volume;
                metric.market_cap = snap.market_cap;

                let change = match snap.previous_close {
                    Some(prev) => percent_change(snap.last_price, prev),
                    None => Err(MetricError::FetchFailure {
                        message: "previous close not reported".into(),
                    }),
                };
                match change {
                    Ok(c) => metric.percent_change_vs_prev_close = Some(c),
                    Err(e) => metric.push_issue(MetricKind::PercentChange, e),
                }
            }
            Err(e) => {
                let err = MetricError::from(e);
                metric.push_issue(MetricKind::Price, err.clone());
                metric.push_issue(MetricKind::PercentChange, err);
            }
        }

        let average = history
            .as_ref()
            .map_err(MetricError::from)
            .and_then(|bars| {
                let ma = moving_average(bars, ma_window)?;
                // moving_average succeeded, so `bars` is non-empty.
                let latest = bars.last().map_or(f64::NAN, |b| b.close);
                Ok((ma.value, percent_deviation(latest, ma.value)))
            });

        match average {
            Ok((value, deviation)) => {
                metric.ma20_value = Some(value);
                match deviation {
                    Ok(d) => metric.percent_deviation_vs_ma20 = Some(d),
                    Err(e) => metric.push_issue(MetricKind::Deviation, e),
                }
            }
            Err(e) => {
                metric.push_issue(MetricKind::MovingAverage, e.clone());
                metric.push_issue(MetricKind::Deviation, e);
            }
        }

        metric
    }

    fn push_issue(&mut self, metric: MetricKind, error: MetricError) {
        self.issues.push(MetricIssue { metric, error });
    }

    /// True when nothing on the card could be computed.
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.ma20_value.is_none()
    }
}
