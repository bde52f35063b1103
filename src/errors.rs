// =============================================================================
// Error taxonomy for fetches and derived metrics
// =============================================================================
//
// Neither type ever escapes a refresh cycle. A `FetchError` is turned into a
// `MetricError::FetchFailure` on the affected card; a `MetricError` marks a
// single value on that card as unavailable.
// =============================================================================

use serde::Serialize;
use thiserror::Error;

/// Failure talking to the market-data provider.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("no data returned for {symbol}")]
    EmptyResult { symbol: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Why a derived metric is unavailable this cycle.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricError {
    #[error("fetch failed: {message}")]
    FetchFailure { message: String },

    #[error("insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("division undefined: baseline is zero")]
    DivisionUndefined,

    #[error("non-finite operand or result")]
    NonFinite,
}

impl From<&FetchError> for MetricError {
    fn from(err: &FetchError) -> Self {
        Self::FetchFailure {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_maps_to_fetch_failure() {
        let err = FetchError::EmptyResult {
            symbol: "AAPL".into(),
        };
        let metric = MetricError::from(&err);
        assert_eq!(
            metric,
            MetricError::FetchFailure {
                message: "no data returned for AAPL".into()
            }
        );
    }

    #[test]
    fn metric_error_serialises_with_kind_tag() {
        let json = serde_json::to_value(MetricError::InsufficientHistory {
            required: 20,
            available: 12,
        })
        .unwrap();
        assert_eq!(json["kind"], "insufficient_history");
        assert_eq!(json["required"], 20);
        assert_eq!(json["available"], 12);
    }
}
