// =============================================================================
// WebSocket Handler: push-based frame updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. The latest dashboard frame immediately on connect.
//   2. The latest frame again whenever `state_version` has moved, checked
//      every 500 ms.
//
// Ping frames are answered with Pong; text frames are ignored.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::presenter::DashboardFrame;

const PUSH_INTERVAL: Duration = Duration::from_millis(500);

/// One outbound message.
#[derive(Serialize)]
struct FramePush<'a> {
    state_version: u64,
    seq: u64,
    frame: Option<&'a DashboardFrame>,
}

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted, upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut sequence: u64 = 0;

    let mut last_sent_version = state.current_state_version();
    if let Err(e) = send_frame(&mut sender, &state, last_sent_version, &mut sequence).await {
        warn!(error = %e, "failed to send initial frame");
        return;
    }

    let mut push_interval = interval(PUSH_INTERVAL);

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let current_version = state.current_state_version();
                if current_version != last_sent_version {
                    if let Err(e) = send_frame(&mut sender, &state, current_version, &mut sequence).await {
                        debug!(error = %e, "WebSocket send failed, disconnecting");
                        break;
                    }
                    last_sent_version = current_version;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send Pong, disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket closed by client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error, disconnecting");
                        break;
                    }
                }
            }
        }
    }

    debug!(sent = sequence, "WebSocket connection finished");
}

/// Serialize and send the latest frame tagged with `version`.
async fn send_frame<S>(
    sender: &mut S,
    state: &AppState,
    version: u64,
    sequence: &mut u64,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    *sequence += 1;
    let frame = state.latest_frame();
    let push = FramePush {
        state_version: version,
        seq: *sequence,
        frame: frame.as_deref(),
    };

    match serde_json::to_string(&push) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            debug!(version, seq = *sequence, "frame pushed");
            Ok(())
        }
        Err(e) => {
            // Not a transport error; keep the connection.
            warn!(error = %e, "failed to serialize frame");
            Ok(())
        }
    }
}
