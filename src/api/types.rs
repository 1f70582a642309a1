use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response to a successful order submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderResponse {
    pub order_id: Uuid,
}

/// Error body for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Acknowledgment sent to a WebSocket subscriber before history replay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAck {
    pub message: &'static str,
    pub order_id: Uuid,
}

impl ConnectedAck {
    pub fn new(order_id: Uuid) -> Self {
        Self {
            message: "connected",
            order_id,
        }
    }
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: i64,
    pub queue_depth: usize,
    pub active_orders: usize,
}
