//! Per-order live-progress WebSocket.
//!
//! On connect: a `connected` acknowledgment, then the order's full event
//! history in original order, then live events until either side closes.
//! Replay-then-live ordering is the broadcaster's `attach` contract; the
//! handler only forwards.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::api::types::ConnectedAck;
use crate::api::AppState;

/// GET /ws/orders/:order_id
pub async fn order_progress_handler(
    ws: WebSocketUpgrade,
    Path(order_id): Path<Uuid>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, order_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, order_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();

    let ack = match serde_json::to_string(&ConnectedAck::new(order_id)) {
        Ok(json) => json,
        Err(e) => {
            error!(%order_id, "failed to serialize connected ack: {e}");
            return;
        }
    };
    if sender.send(Message::Text(ack)).await.is_err() {
        return;
    }

    // Attach after the ack so the acknowledgment precedes the replay.
    let (subscriber_id, mut events) = state.broadcaster.attach(order_id);
    info!(%order_id, subscriber = subscriber_id, "websocket subscriber connected");

    // Forward replayed and live events to the client.
    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!(%order_id, "failed to serialize event: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Drain the client side until it closes.
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Ping(_) | Message::Pong(_) => {
                // Axum answers pings automatically.
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    send_task.abort();
    state.broadcaster.detach(order_id, subscriber_id);
    debug!(%order_id, subscriber = subscriber_id, "websocket subscriber disconnected");
}
