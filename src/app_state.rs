// =============================================================================
// Central Application State
// =============================================================================
//
// Shared by the refresh scheduler (the only writer of frames) and the API
// handlers (readers). Each published frame is immutable; handlers clone the
// `Arc` and never hold a lock across an await.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for settings, the latest frame and the error log.
//   - tokio::sync::Notify to wake the scheduler for an immediate refresh.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::market_clock::MarketClock;
use crate::presenter::DashboardFrame;
use crate::refresh::CycleContext;
use crate::runtime_config::RuntimeConfig;
use crate::types::{RefreshInterval, TimeRange};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Cycle that produced the error, if any.
    pub cycle_id: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

pub struct AppState {
    /// Incremented on every published frame or settings change. The
    /// WebSocket feed pushes whenever it moves.
    pub state_version: AtomicU64,

    /// Completed refresh cycles since start-up.
    pub cycles_completed: AtomicU64,

    /// Effective settings: the file config plus environment overrides.
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    /// Settings as they are written to `config_path`. Environment overrides
    /// never reach it; only selections made through the API do.
    persisted: RwLock<RuntimeConfig>,

    /// Where settings changes are saved; `None` disables saving.
    pub config_path: Option<PathBuf>,

    pub clock: MarketClock,

    pub latest_frame: RwLock<Option<Arc<DashboardFrame>>>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Wakes the scheduler out of its sleep.
    pub refresh_requested: Notify,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            cycles_completed: AtomicU64::new(0),
            persisted: RwLock::new(config.clone()),
            runtime_config: Arc::new(RwLock::new(config)),
            config_path,
            clock: MarketClock::default(),
            latest_frame: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            refresh_requested: Notify::new(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Use `base` as the settings written back to disk, in place of the
    /// effective config passed to [`AppState::new`].
    pub fn with_persisted(self, base: RuntimeConfig) -> Self {
        *self.persisted.write() = base;
        self
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Cycle plumbing ──────────────────────────────────────────────────

    /// Snapshot the current settings into the context of a new cycle.
    pub fn cycle_context(&self) -> CycleContext {
        let config = self.runtime_config.read();
        CycleContext::from_config(&config, self.clock, Utc::now())
    }

    /// Make `frame` the latest frame and log its failures.
    pub fn publish_frame(&self, frame: DashboardFrame) {
        let cycle_id = frame.cycle_id.to_string();
        for msg in frame.issue_messages() {
            self.record_error(msg, Some(cycle_id.clone()));
        }

        *self.latest_frame.write() = Some(Arc::new(frame));
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        self.increment_version();
    }

    pub fn latest_frame(&self) -> Option<Arc<DashboardFrame>> {
        self.latest_frame.read().clone()
    }

    /// Ask the scheduler to start a new cycle now. If a cycle is running, the
    /// request is kept and the next cycle starts as soon as it finishes.
    pub fn request_refresh(&self) {
        self.refresh_requested.notify_one();
    }

    // ── Settings ────────────────────────────────────────────────────────

    /// Apply a chart range and/or refresh interval selection. Returns one
    /// line per value that actually changed. A change is saved best-effort,
    /// bumps the version and wakes the scheduler.
    pub fn update_selections(
        &self,
        time_range: Option<TimeRange>,
        refresh_interval: Option<RefreshInterval>,
    ) -> Vec<String> {
        let mut changes = Vec::new();
        {
            let mut config = self.runtime_config.write();
            let mut persisted = self.persisted.write();

            if let Some(range) = time_range {
                if config.time_range != range {
                    changes.push(format!("time_range: {} -> {}", config.time_range, range));
                    config.time_range = range;
                    persisted.time_range = range;
                }
            }
            if let Some(refresh) = refresh_interval {
                if config.refresh_interval != refresh {
                    changes.push(format!(
                        "refresh_interval: {} -> {}",
                        config.refresh_interval, refresh
                    ));
                    config.refresh_interval = refresh;
                    persisted.refresh_interval = refresh;
                }
            }
        }

        if changes.is_empty() {
            return changes;
        }

        info!(changes = ?changes, "settings updated");
        if let Err(e) = self.save_settings() {
            warn!(error = %e, "failed to save settings to disk");
            self.push_error(format!("failed to save settings: {e:#}"));
        }

        self.increment_version();
        self.request_refresh();
        changes
    }

    /// Write the persisted settings to `config_path`, if there is one.
    pub fn save_settings(&self) -> anyhow::Result<()> {
        match &self.config_path {
            Some(path) => {
                let snapshot = self.persisted.read().clone();
                snapshot.save(path)
            }
            None => Ok(()),
        }
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, msg: String) {
        self.record_error(msg, None);
        self.increment_version();
    }

    fn record_error(&self, message: String, cycle_id: Option<String>) {
        let record = ErrorRecord {
            message,
            cycle_id,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::IndexPanel;
    use crate::types::SessionState;

    fn frame(error: Option<&str>) -> DashboardFrame {
        DashboardFrame {
            cycle_id: uuid::Uuid::new_v4(),
            generated_at: String::new(),
            generated_at_exchange: String::new(),
            session: SessionState::Closed,
            time_range: TimeRange::OneDay,
            refresh_interval: RefreshInterval::Off,
            index: IndexPanel {
                symbol: "^IXIC".into(),
                name: String::new(),
                bars: Vec::new(),
                overlays: Vec::new(),
                error: error.map(str::to_string),
            },
            cards: Vec::new(),
        }
    }

    #[test]
    fn publish_replaces_frame_and_bumps_version() {
        let state = AppState::new(RuntimeConfig::default(), None);
        assert!(state.latest_frame().is_none());
        let v0 = state.current_state_version();

        let f = frame(None);
        let id = f.cycle_id;
        state.publish_frame(f);

        assert_eq!(state.latest_frame().unwrap().cycle_id, id);
        assert_eq!(state.current_state_version(), v0 + 1);
        assert_eq!(state.cycles_completed.load(Ordering::SeqCst), 1);
        assert!(state.recent_errors().is_empty());
    }

    #[test]
    fn frame_issues_land_in_error_log() {
        let state = AppState::new(RuntimeConfig::default(), None);
        let f = frame(Some("provider error: down"));
        let id = f.cycle_id.to_string();
        state.publish_frame(f);

        let errors = state.recent_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "^IXIC: provider error: down");
        assert_eq!(errors[0].cycle_id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn error_log_is_capped() {
        let state = AppState::new(RuntimeConfig::default(), None);
        for i in 0..(MAX_RECENT_ERRORS + 10) {
            state.push_error(format!("e{i}"));
        }
        let errors = state.recent_errors();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "e10");
    }

    #[test]
    fn selection_update_reports_only_real_changes() {
        let state = AppState::new(RuntimeConfig::default(), None);
        let changes = state.update_selections(Some(TimeRange::OneDay), Some(RefreshInterval::Secs60));
        assert_eq!(changes, vec!["refresh_interval: off -> 60s".to_string()]);
        assert_eq!(state.runtime_config.read().refresh_interval, RefreshInterval::Secs60);

        assert!(state.update_selections(None, Some(RefreshInterval::Secs60)).is_empty());
    }

    #[test]
    fn env_overrides_never_reach_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor_config.json");

        let base = RuntimeConfig::default();
        base.save(&path).unwrap();

        let mut effective = RuntimeConfig::load(&path).unwrap();
        effective.apply_env(|k| match k {
            "MONITOR_BIND_ADDR" => Some("127.0.0.1:9000".into()),
            "MONITOR_SYMBOLS" => Some("QQQ".into()),
            "MONITOR_REFRESH" => Some("30s".into()),
            _ => None,
        });
        let state = AppState::new(effective, Some(path.clone())).with_persisted(base);
        assert_eq!(state.runtime_config.read().bind_addr, "127.0.0.1:9000");

        // A settings change saves the file...
        state.update_selections(Some(TimeRange::FiveDays), None);
        let saved = RuntimeConfig::load(&path).unwrap();
        assert_eq!(saved.time_range, TimeRange::FiveDays);
        assert_eq!(saved.bind_addr, "0.0.0.0:3001");
        assert_eq!(saved.watchlist.len(), 7);
        assert_eq!(saved.refresh_interval, RefreshInterval::Off);

        // ...and so does shutdown.
        state.save_settings().unwrap();
        let saved = RuntimeConfig::load(&path).unwrap();
        assert_eq!(saved.bind_addr, "0.0.0.0:3001");
        assert_eq!(saved.watchlist.len(), 7);
        assert_eq!(saved.time_range, TimeRange::FiveDays);
    }

    #[test]
    fn failed_save_is_logged_but_selection_applies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("monitor_config.json");
        let state = AppState::new(RuntimeConfig::default(), Some(path));

        let changes = state.update_selections(Some(TimeRange::OneYear), None);
        assert_eq!(changes.len(), 1);
        assert_eq!(state.runtime_config.read().time_range, TimeRange::OneYear);
        let errors = state.recent_errors();
        assert!(errors[0].message.starts_with("failed to save settings"));
    }

    #[test]
    fn cycle_context_copies_settings() {
        let mut cfg = RuntimeConfig::default();
        cfg.time_range = TimeRange::ThreeMonths;
        let state = AppState::new(cfg, None);
        let ctx = state.cycle_context();
        assert_eq!(ctx.time_range, TimeRange::ThreeMonths);

        state.runtime_config.write().time_range = TimeRange::OneYear;
        assert_eq!(ctx.time_range, TimeRange::ThreeMonths);
    }
}
