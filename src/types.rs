// =============================================================================
// Shared types used across the NASDAQ monitor
// =============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A ticker the dashboard watches, with the name shown on its card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedSymbol {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
}

impl WatchedSymbol {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

/// Whether the reference exchange is currently accepting trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Open,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Historical window for the index chart. Each variant maps to a fixed
/// provider `(period, interval)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl TimeRange {
    pub const ALL: [TimeRange; 5] = [
        Self::OneDay,
        Self::FiveDays,
        Self::OneMonth,
        Self::ThreeMonths,
        Self::OneYear,
    ];

    pub fn period(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::OneYear => "1y",
        }
    }

    pub fn interval(self) -> &'static str {
        match self {
            Self::OneDay => "1m",
            Self::FiveDays => "5m",
            Self::OneMonth => "1h",
            Self::ThreeMonths | Self::OneYear => "1d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneDay => "1 Day",
            Self::FiveDays => "5 Days",
            Self::OneMonth => "1 Month",
            Self::ThreeMonths => "3 Months",
            Self::OneYear => "1 Year",
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::OneDay
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.period(), self.interval())
    }
}

/// How often the scheduler re-runs the refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshInterval {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "30s")]
    Secs30,
    #[serde(rename = "60s")]
    Secs60,
    #[serde(rename = "300s")]
    Secs300,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 4] = [Self::Off, Self::Secs30, Self::Secs60, Self::Secs300];

    /// Sleep between cycles, or `None` when automatic refresh is disabled.
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Off => None,
            Self::Secs30 => Some(Duration::from_secs(30)),
            Self::Secs60 => Some(Duration::from_secs(60)),
            Self::Secs300 => Some(Duration::from_secs(300)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "No auto refresh",
            Self::Secs30 => "30 seconds",
            Self::Secs60 => "1 minute",
            Self::Secs300 => "5 minutes",
        }
    }

    /// Parse the short form used in config files and env vars (`off`, `30s`,
    /// or a bare number of seconds).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        match raw.strip_suffix('s').unwrap_or(&raw) {
            "off" | "0" => Some(Self::Off),
            "30" => Some(Self::Secs30),
            "60" => Some(Self::Secs60),
            "300" => Some(Self::Secs300),
            _ => None,
        }
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self::Off
    }
}

impl std::fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.duration() {
            Some(d) => write!(f, "{}s", d.as_secs()),
            None => write!(f, "off"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_pairs_match_provider_codes() {
        let pairs: Vec<(&str, &str)> = TimeRange::ALL
            .iter()
            .map(|r| (r.period(), r.interval()))
            .collect();
        assert_eq!(
            pairs,
            vec![("1d", "1m"), ("5d", "5m"), ("1mo", "1h"), ("3mo", "1d"), ("1y", "1d")]
        );
    }

    #[test]
    fn time_range_serialises_as_period_code() {
        let json = serde_json::to_string(&TimeRange::ThreeMonths).unwrap();
        assert_eq!(json, "\"3mo\"");
        let back: TimeRange = serde_json::from_str("\"5d\"").unwrap();
        assert_eq!(back, TimeRange::FiveDays);
    }

    #[test]
    fn unknown_time_range_is_rejected() {
        assert!(serde_json::from_str::<TimeRange>("\"2w\"").is_err());
    }

    #[test]
    fn refresh_interval_durations() {
        assert_eq!(RefreshInterval::Off.duration(), None);
        assert_eq!(RefreshInterval::Secs30.duration(), Some(Duration::from_secs(30)));
        assert_eq!(RefreshInterval::Secs300.duration(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn refresh_interval_parse_accepts_short_forms() {
        assert_eq!(RefreshInterval::parse("off"), Some(RefreshInterval::Off));
        assert_eq!(RefreshInterval::parse("60s"), Some(RefreshInterval::Secs60));
        assert_eq!(RefreshInterval::parse(" 300 "), Some(RefreshInterval::Secs300));
        assert_eq!(RefreshInterval::parse("45s"), None);
    }

    #[test]
    fn refresh_interval_parse_strips_one_suffix_only() {
        assert_eq!(RefreshInterval::parse("30S"), Some(RefreshInterval::Secs30));
        assert_eq!(RefreshInterval::parse("30ss"), None);
        assert_eq!(RefreshInterval::parse("300sss"), None);
    }
}
