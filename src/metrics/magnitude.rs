// =============================================================================
// Large-number formatting
// =============================================================================
//
// Scales to the largest matching suffix: B (>= 1e9), M (>= 1e6), K (>= 1e3),
// or none, with two decimals. Negative values fall through to the plain form.

/// Sentinel shown whenever a value cannot be formatted.
pub const NOT_AVAILABLE: &str = "N/A";

const BILLION: f64 = 1_000_000_000.0;
const MILLION: f64 = 1_000_000.0;
const THOUSAND: f64 = 1_000.0;

/// Format `value` with a magnitude suffix; `None` or a non-finite value gives
/// [`NOT_AVAILABLE`].
pub fn format_magnitude(value: Option<f64>) -> String {
    let Some(n) = value.filter(|v| v.is_finite()) else {
        return NOT_AVAILABLE.to_string();
    };

    if n >= BILLION {
        format!("{:.2}B", n / BILLION)
    } else if n >= MILLION {
        format!("{:.2}M", n / MILLION)
    } else if n >= THOUSAND {
        format!("{:.2}K", n / THOUSAND)
    } else {
        format!("{n:.2}")
    }
}
