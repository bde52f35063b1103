// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The service is read-mostly: the
// dashboard frame is produced by the scheduler, handlers only read it. The
// two write endpoints change the chart range / refresh interval and request
// an immediate refresh.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::types::{RefreshInterval, SessionState, TimeRange};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/market-status", get(market_status))
        .route("/api/v1/options", get(options))
        .route("/api/v1/settings", get(get_settings).post(set_settings))
        .route("/api/v1/refresh", post(refresh_now))
        .route("/api/v1/errors", get(errors))
        // ── WebSocket (handled in ws module but mounted here) ───────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    cycles_completed: u64,
    uptime_secs: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        cycles_completed: state
            .cycles_completed
            .load(std::sync::atomic::Ordering::SeqCst),
        uptime_secs: state.start_time.elapsed().as_secs(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Dashboard frame
// =============================================================================

async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.latest_frame() {
        Some(frame) => Json(serde_json::json!({ "frame": frame.as_ref() })).into_response(),
        None => Json(serde_json::json!({
            "frame": null,
            "message": "No refresh cycle has completed yet",
        }))
        .into_response(),
    }
}

// =============================================================================
// Market status
// =============================================================================

#[derive(Serialize)]
struct MarketStatusResponse {
    session: SessionState,
    exchange_time: String,
    timezone: String,
}

async fn market_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    Json(MarketStatusResponse {
        session: state.clock.session_state(&now),
        exchange_time: state.clock.exchange_time(&now),
        timezone: state.clock.tz().name().to_string(),
    })
}

// =============================================================================
// Options & settings
// =============================================================================

#[derive(Serialize)]
struct TimeRangeOption {
    value: TimeRange,
    label: &'static str,
    period: &'static str,
    interval: &'static str,
}

#[derive(Serialize)]
struct RefreshOption {
    value: RefreshInterval,
    label: &'static str,
    seconds: u64,
}

async fn options() -> impl IntoResponse {
    let time_ranges: Vec<TimeRangeOption> = TimeRange::ALL
        .iter()
        .map(|&r| TimeRangeOption {
            value: r,
            label: r.label(),
            period: r.period(),
            interval: r.interval(),
        })
        .collect();
    let refresh_intervals: Vec<RefreshOption> = RefreshInterval::ALL
        .iter()
        .map(|&r| RefreshOption {
            value: r,
            label: r.label(),
            seconds: r.duration().map_or(0, |d| d.as_secs()),
        })
        .collect();

    Json(serde_json::json!({
        "time_ranges": time_ranges,
        "refresh_intervals": refresh_intervals,
    }))
}

#[derive(Serialize)]
struct SettingsResponse {
    time_range: TimeRange,
    refresh_interval: RefreshInterval,
    symbols: Vec<String>,
    index: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changes: Vec<String>,
}

fn settings_response(state: &AppState, changes: Vec<String>) -> SettingsResponse {
    let config = state.runtime_config.read();
    SettingsResponse {
        time_range: config.time_range,
        refresh_interval: config.refresh_interval,
        symbols: config.watchlist.iter().map(|w| w.symbol.clone()).collect(),
        index: config.index.symbol.clone(),
        changes,
    }
}

async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(settings_response(&state, Vec::new()))
}

#[derive(Deserialize)]
struct SettingsUpdate {
    #[serde(default)]
    time_range: Option<TimeRange>,
    #[serde(default)]
    refresh_interval: Option<RefreshInterval>,
}

async fn set_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    let changes = state.update_selections(update.time_range, update.refresh_interval);
    Json(settings_response(&state, changes))
}

// =============================================================================
// Refresh now
// =============================================================================

async fn refresh_now(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.request_refresh();
    info!("refresh requested via API");
    Json(serde_json::json!({
        "status": "scheduled",
        "server_time": chrono::Utc::now().timestamp_millis(),
    }))
}

// =============================================================================
// Error log
// =============================================================================

async fn errors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_errors())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::refresh::tests::{test_config, FakeGateway};
    use crate::scheduler::run_once;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState::new(test_config(), None))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_json(router(app_state()), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cycles_completed"], 0);
    }

    #[tokio::test]
    async fn dashboard_before_first_cycle_is_null() {
        let (status, body) = get_json(router(app_state()), "/api/v1/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["frame"].is_null());
    }

    #[tokio::test]
    async fn dashboard_serves_latest_frame() {
        let state = app_state();
        let gateway = FakeGateway::new()
            .with_series("AAPL", vec![100.0; 21])
            .failing("MSFT");
        run_once(&state, &gateway).await;

        let (_, body) = get_json(router(state), "/api/v1/dashboard").await;
        let cards = body["frame"]["cards"].as_array().unwrap();
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0]["view"]["price"], "$100.000");
        assert_eq!(cards[0]["metric"]["percent_change_vs_prev_close"], 0.0);
        assert_eq!(cards[1]["view"]["price"], "No data");
        assert_eq!(cards[1]["metric"]["issues"][0]["error"]["kind"], "fetch_failure");
    }

    #[tokio::test]
    async fn options_list_enumerated_choices() {
        let (_, body) = get_json(router(app_state()), "/api/v1/options").await;
        assert_eq!(body["time_ranges"].as_array().unwrap().len(), 5);
        assert_eq!(body["time_ranges"][2]["value"], "1mo");
        assert_eq!(body["time_ranges"][2]["interval"], "1h");
        assert_eq!(body["refresh_intervals"][0]["value"], "off");
        assert_eq!(body["refresh_intervals"][3]["seconds"], 300);
    }

    #[tokio::test]
    async fn settings_update_changes_selection_and_requests_refresh() {
        let state = app_state();
        let (status, body) = post_json(
            router(state.clone()),
            "/api/v1/settings",
            r#"{ "time_range": "5d", "refresh_interval": "30s" }"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["time_range"], "5d");
        assert_eq!(body["refresh_interval"], "30s");
        assert_eq!(body["changes"].as_array().unwrap().len(), 2);
        assert_eq!(state.runtime_config.read().time_range, TimeRange::FiveDays);

        // The stored permit means the scheduler would wake immediately.
        tokio::time::timeout(
            std::time::Duration::from_millis(100),
            state.refresh_requested.notified(),
        )
        .await
        .expect("refresh should be requested");
    }

    #[tokio::test]
    async fn settings_reject_unknown_values() {
        let state = app_state();
        let (status, _) = post_json(
            router(state.clone()),
            "/api/v1/settings",
            r#"{ "refresh_interval": "45s" }"#,
        )
        .await;
        assert!(status.is_client_error());
        assert_eq!(state.runtime_config.read().refresh_interval, RefreshInterval::Off);
    }

    #[tokio::test]
    async fn market_status_has_exchange_timezone() {
        let (_, body) = get_json(router(app_state()), "/api/v1/market-status").await;
        assert_eq!(body["timezone"], "America/New_York");
        assert!(body["exchange_time"].as_str().unwrap().ends_with(" ET"));
        let session = body["session"].as_str().unwrap();
        assert!(session == "Open" || session == "Closed");
    }

    #[tokio::test]
    async fn errors_endpoint_lists_cycle_failures() {
        let state = app_state();
        run_once(&state, &FakeGateway::new().failing("^IXIC")).await;
        let (_, body) = get_json(router(state), "/api/v1/errors").await;
        let errors = body.as_array().unwrap();
        assert!(errors
            .iter()
            .any(|e| e["message"].as_str().unwrap().starts_with("^IXIC:")));
    }
}
