// =============================================================================
// Runtime Configuration: dashboard settings with atomic save
// =============================================================================
//
// Watchlist, index symbol, chart range, refresh interval and provider
// settings. The chart range and refresh interval can be changed at runtime
// through the API; those changes are written back to disk best-effort.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{RefreshInterval, TimeRange, WatchedSymbol};

/// Default location of the config file, relative to the working directory.
pub const CONFIG_PATH: &str = "monitor_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_watchlist() -> Vec<WatchedSymbol> {
    vec![
        WatchedSymbol::new("MSFT", "Microsoft"),
        WatchedSymbol::new("AAPL", "Apple"),
        WatchedSymbol::new("GOOGL", "Alphabet (Google) Class A"),
        WatchedSymbol::new("NVDA", "NVIDIA"),
        WatchedSymbol::new("AMZN", "Amazon"),
        WatchedSymbol::new("META", "Meta Platforms"),
        WatchedSymbol::new("TSLA", "Tesla"),
    ]
}

fn default_index() -> WatchedSymbol {
    WatchedSymbol::new("^IXIC", "NASDAQ Composite")
}

fn default_ma_window() -> usize {
    20
}

fn default_ma_period() -> String {
    "1mo".to_string()
}

fn default_ma_interval() -> String {
    "1d".to_string()
}

fn default_chart_ma_windows() -> Vec<usize> {
    vec![5, 10, 20]
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_cookie_url() -> String {
    "https://fc.yahoo.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

// =============================================================================
// ProviderConfig
// =============================================================================

/// Market-data provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Issues the session cookie needed before asking for a crumb.
    #[serde(default = "default_cookie_url")]
    pub cookie_url: String,

    /// Per-request timeout. A timed-out request counts as a fetch failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie_url: default_cookie_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Symbols -------------------------------------------------------------

    /// Stocks shown as summary cards, in display order.
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<WatchedSymbol>,

    /// Index drawn as the candlestick chart.
    #[serde(default = "default_index")]
    pub index: WatchedSymbol,

    // --- User selections -----------------------------------------------------

    /// Chart period/interval pair.
    #[serde(default)]
    pub time_range: TimeRange,

    /// Automatic refresh cadence.
    #[serde(default)]
    pub refresh_interval: RefreshInterval,

    // --- Metrics -------------------------------------------------------------

    /// Window of the card moving average (the "MA20").
    #[serde(default = "default_ma_window")]
    pub ma_window: usize,

    /// History fetched for the card moving average.
    #[serde(default = "default_ma_period")]
    pub ma_period: String,

    #[serde(default = "default_ma_interval")]
    pub ma_interval: String,

    /// Moving-average overlays drawn on the index chart.
    #[serde(default = "default_chart_ma_windows")]
    pub chart_ma_windows: Vec<usize>,

    // --- Server & provider ---------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            watchlist: default_watchlist(),
            index: default_index(),
            time_range: TimeRange::default(),
            refresh_interval: RefreshInterval::default(),
            ma_window: default_ma_window(),
            ma_period: default_ma_period(),
            ma_interval: default_ma_interval(),
            chart_ma_windows: default_chart_ma_windows(),
            bind_addr: default_bind_addr(),
            provider: ProviderConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = config.watchlist.len(),
            time_range = %config.time_range,
            refresh = %config.refresh_interval,
            "config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }

    /// Apply `MONITOR_*` overrides from an environment lookup.
    ///
    /// Unparseable values are ignored with a warning. Apply these to a copy:
    /// overrides belong to one run and must not be saved back to the file.
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(syms) = get("MONITOR_SYMBOLS") {
            let parsed: Vec<WatchedSymbol> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .map(|s| {
                    let name = self
                        .watchlist
                        .iter()
                        .find(|w| w.symbol == s)
                        .map(|w| w.name.clone())
                        .unwrap_or_default();
                    WatchedSymbol::new(s, name)
                })
                .collect();
            if !parsed.is_empty() {
                self.watchlist = parsed;
            }
        }

        if let Some(addr) = get("MONITOR_BIND_ADDR") {
            self.bind_addr = addr;
        }

        if let Some(raw) = get("MONITOR_REFRESH") {
            match RefreshInterval::parse(&raw) {
                Some(r) => self.refresh_interval = r,
                None => warn!(value = %raw, "ignoring invalid MONITOR_REFRESH"),
            }
        }

        if let Some(raw) = get("MONITOR_TIME_RANGE") {
            match serde_json::from_value::<TimeRange>(serde_json::Value::String(raw.clone())) {
                Ok(r) => self.time_range = r,
                Err(_) => warn!(value = %raw, "ignoring invalid MONITOR_TIME_RANGE"),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        let symbols: Vec<&str> = cfg.watchlist.iter().map(|w| w.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["MSFT", "AAPL", "GOOGL", "NVDA", "AMZN", "META", "TSLA"]);
        assert_eq!(cfg.index.symbol, "^IXIC");
        assert_eq!(cfg.time_range, TimeRange::OneDay);
        assert_eq!(cfg.refresh_interval, RefreshInterval::Off);
        assert_eq!(cfg.ma_window, 20);
        assert_eq!(cfg.chart_ma_windows, vec![5, 10, 20]);
        assert_eq!(cfg.provider.request_timeout_secs, 10);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.watchlist.len(), 7);
        assert_eq!(cfg.ma_period, "1mo");
        assert_eq!(cfg.ma_interval, "1d");
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "time_range": "3mo", "refresh_interval": "60s",
                        "watchlist": [{ "symbol": "AAPL" }] }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.time_range, TimeRange::ThreeMonths);
        assert_eq!(cfg.refresh_interval, RefreshInterval::Secs60);
        assert_eq!(cfg.watchlist, vec![WatchedSymbol::new("AAPL", "")]);
        assert_eq!(cfg.ma_window, 20);
    }

    #[test]
    fn save_then_load_round_trips_selections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor_config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.time_range = TimeRange::OneYear;
        cfg.refresh_interval = RefreshInterval::Secs300;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.time_range, TimeRange::OneYear);
        assert_eq!(loaded.refresh_interval, RefreshInterval::Secs300);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        assert!(RuntimeConfig::load("/nonexistent/monitor_config.json").is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("MONITOR_SYMBOLS", "aapl, tsla ,,qqq"),
            ("MONITOR_BIND_ADDR", "127.0.0.1:9000"),
            ("MONITOR_REFRESH", "30s"),
            ("MONITOR_TIME_RANGE", "5d"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RuntimeConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            cfg.watchlist,
            vec![
                WatchedSymbol::new("AAPL", "Apple"),
                WatchedSymbol::new("TSLA", "Tesla"),
                WatchedSymbol::new("QQQ", ""),
            ]
        );
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.refresh_interval, RefreshInterval::Secs30);
        assert_eq!(cfg.time_range, TimeRange::FiveDays);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_env(|k| match k {
            "MONITOR_REFRESH" => Some("7s".into()),
            "MONITOR_TIME_RANGE" => Some("2w".into()),
            "MONITOR_SYMBOLS" => Some(" , ".into()),
            _ => None,
        });
        assert_eq!(cfg.refresh_interval, RefreshInterval::Off);
        assert_eq!(cfg.time_range, TimeRange::OneDay);
        assert_eq!(cfg.watchlist.len(), 7);
    }
}
