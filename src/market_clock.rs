// =============================================================================
// Market Clock: exchange session state
// =============================================================================
//
// The regular NASDAQ session runs Monday to Friday, 09:30 to 16:00
// America/New_York. The window is half-open: 16:00:00 is already closed.
//
// Known limitation: there is no holiday calendar and no early-close handling,
// so the clock reports Open on exchange holidays and until 16:00 on half-days.
// =============================================================================

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::types::SessionState;

/// Reference exchange timezone.
pub const EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

/// Fixed trading window of one exchange.
#[derive(Debug, Clone, Copy)]
pub struct MarketClock {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl Default for MarketClock {
    fn default() -> Self {
        Self {
            tz: EXCHANGE_TZ,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl MarketClock {
    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Session state at `now`, which may be in any timezone.
    pub fn session_state<Z: TimeZone>(&self, now: &DateTime<Z>) -> SessionState {
        let local = now.with_timezone(&self.tz);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return SessionState::Closed;
        }

        let t = local.time();
        if t >= self.open && t < self.close {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    /// Current session state.
    pub fn current_state(&self) -> SessionState {
        self.session_state(&Utc::now())
    }

    /// `now` rendered in exchange time, e.g. `2024-01-10 10:00:00 ET`.
    pub fn exchange_time<Z: TimeZone>(&self, now: &DateTime<Z>) -> String {
        format!(
            "{} ET",
            now.with_timezone(&self.tz).format("%Y-%m-%d %H:%M:%S")
        )
    }
}
