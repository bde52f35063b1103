// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Unweighted arithmetic mean of the closes of the most recent `window` bars.
//
//   SMA_t = (close_{t-window+1} + ... + close_t) / window
// =============================================================================

use serde::Serialize;

use crate::errors::MetricError;
use crate::market_data::Bar;

/// Moving average at the most recent bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovingAverage {
    pub window: usize,
    pub value: f64,
}

/// Mean close of the last `window` bars of `bars`.
///
/// # Errors
/// - `InsufficientHistory` when `window == 0` or `bars.len() < window`.
/// - `NonFinite` when a close in the window is NaN or infinite.
pub fn moving_average(bars: &[Bar], window: usize) -> Result<MovingAverage, MetricError> {
    if window == 0 || bars.len() < window {
        return Err(MetricError::InsufficientHistory {
            required: window,
            available: bars.len(),
        });
    }

    let sum: f64 = bars[bars.len() - window..].iter().map(|b| b.close).sum();
    let value = sum / window as f64;
    if !value.is_finite() {
        return Err(MetricError::NonFinite);
    }

    Ok(MovingAverage { window, value })
}

/// Rolling SMA aligned index-for-index with `closes`.
///
/// The first `window - 1` positions are `None`. Returns all `None` when
/// `window == 0` or the input is shorter than `window`.
pub fn moving_average_series(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if window == 0 || closes.len() < window {
        return out;
    }

    let mut sum: f64 = closes[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);

    for i in window..closes.len() {
        sum += closes[i] - closes[i - window];
        out[i] = Some(sum / window as f64);
    }

    // A NaN in the input poisons the running sum; recompute those windows
    // directly so one bad close only blanks the windows that contain it.
    for (i, slot) in out.iter_mut().enumerate().skip(window - 1) {
        if slot.map_or(false, |v| !v.is_finite()) {
            let direct = closes[i + 1 - window..=i].iter().sum::<f64>() / window as f64;
            *slot = direct.is_finite().then_some(direct);
        }
    }

    out
}
