use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderStatus;

/// One immutable, timestamped progress record for an order.
///
/// Events for one order form an append-only sequence owned by the event
/// log; insertion order is emission order and is the only ordering
/// guarantee the system makes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub status: OrderStatus,
    /// Stage-specific metadata: chosen venue, tx hash, executed price,
    /// error message.
    pub meta: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(order_id: Uuid, status: OrderStatus, meta: serde_json::Value) -> Self {
        Self {
            order_id,
            status,
            meta,
            timestamp: Utc::now(),
        }
    }
}
