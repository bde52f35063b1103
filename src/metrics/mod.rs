// =============================================================================
// Metrics Engine
// =============================================================================
//
// Pure, side-effect-free computations over fetched bars and snapshots.  Every
// fallible function returns `Result<_, MetricError>` so callers can show the
// reason a value is missing instead of an infinity or NaN.

pub mod display;
pub mod magnitude;
pub mod moving_average;
pub mod percent;

pub use display::{DisplayMetric, MetricIssue, MetricKind};
pub use magnitude::format_magnitude;
pub use moving_average::{moving_average, moving_average_series, MovingAverage};
pub use percent::{percent_change, percent_deviation};
