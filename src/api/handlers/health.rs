use axum::{extract::State, Json};

use crate::api::types::HealthResponse;
use crate::api::AppState;

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        queue_depth: state.queue.depth(),
        active_orders: state.broadcaster.active_orders(),
    })
}
