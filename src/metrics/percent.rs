// =============================================================================
// Percent change
// =============================================================================
//
//   change = (current - baseline) / baseline * 100
//
// Used both for price vs previous close and for price vs moving average.

use crate::errors::MetricError;

/// Percent change of `current` relative to `baseline`.
///
/// # Errors
/// - `DivisionUndefined` when `baseline == 0`.
/// - `NonFinite` when either operand or the result is NaN or infinite.
pub fn percent_change(current: f64, baseline: f64) -> Result<f64, MetricError> {
    if !current.is_finite() || !baseline.is_finite() {
        return Err(MetricError::NonFinite);
    }
    if baseline == 0.0 {
        return Err(MetricError::DivisionUndefined);
    }

    let change = (current - baseline) / baseline * 100.0;
    if !change.is_finite() {
        return Err(MetricError::NonFinite);
    }
    Ok(change)
}

/// Percent by which `price` sits above (positive) or below (negative) a
/// moving-average `average`.
pub fn percent_deviation(price: f64, average: f64) -> Result<f64, MetricError> {
    percent_change(price, average)
}
