// =============================================================================
// Refresh Scheduler: timed loop driving the refresh cycle
// =============================================================================
//
// One task, one cycle at a time:
//
//   loop {
//       context  <- settings at this instant
//       frame    <- run_cycle(gateway, context)
//       publish(frame)
//       wait for the refresh interval, or forever when it is `off`,
//       returning early on a refresh request
//   }
//
// Cycles cannot overlap: the next one is only started after the previous
// frame has been published.
// =============================================================================

use std::sync::Arc;

use tracing::{debug, info};

use crate::app_state::AppState;
use crate::market_data::MarketDataGateway;
use crate::refresh::run_cycle;

/// Run refresh cycles forever. Spawn once at start-up.
pub async fn run_refresh_loop(state: Arc<AppState>, gateway: Arc<dyn MarketDataGateway>) {
    info!(provider = gateway.id(), "refresh scheduler started");

    loop {
        run_once(&state, gateway.as_ref()).await;
        wait_for_next_cycle(&state).await;
    }
}

/// Run a single cycle with the current settings and publish its frame.
pub async fn run_once(state: &AppState, gateway: &dyn MarketDataGateway) {
    let ctx = state.cycle_context();
    let frame = run_cycle(gateway, &ctx).await;
    state.publish_frame(frame);
}

async fn wait_for_next_cycle(state: &AppState) {
    let interval = state.runtime_config.read().refresh_interval;

    match interval.duration() {
        Some(period) => {
            debug!(secs = period.as_secs(), "sleeping until next refresh");
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = state.refresh_requested.notified() => {
                    debug!("refresh requested");
                }
            }
        }
        None => {
            debug!("auto refresh off; waiting for a refresh request");
            state.refresh_requested.notified().await;
        }
    }
}
