use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status.
///
/// Canonical vocabulary for the whole system: `Pending` is always the
/// first status of a pipeline attempt, `Confirmed` the only success
/// terminal, `Failed` the only failure terminal. Any non-terminal status
/// may transition directly to `Failed` when its stage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order accepted, attempt started
    Pending,
    /// Fetching quotes from venues
    Routing,
    /// Route chosen, transaction assembled
    Building,
    /// Transaction dispatched to the venue
    Submitted,
    /// Settlement confirmed (terminal success)
    Confirmed,
    /// Attempt failed (terminal failure)
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Routing => "routing",
            OrderStatus::Building => "building",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Submission payload accepted at the HTTP boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount: Decimal,
    #[serde(default)]
    pub slippage: Option<Decimal>,
}

/// A single token-swap request tracked through its execution lifecycle.
///
/// Immutable after submission except for `status` and the accumulated
/// result fields, which only the pipeline mutates while processing the
/// order's own job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: Uuid,
    pub token_in: String,
    pub token_out: String,
    pub amount: Decimal,
    pub slippage: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Order {
    pub const DEFAULT_SLIPPAGE: Decimal = dec!(0.01);

    /// Create a new order with a fresh identifier. Input must already be
    /// validated (see `validation::validate_submission`).
    pub fn new(request: SubmitOrderRequest) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            token_in: request.token_in,
            token_out: request.token_out,
            amount: request.amount,
            slippage: request.slippage.unwrap_or(Self::DEFAULT_SLIPPAGE),
            created_at: Utc::now(),
            status: OrderStatus::Pending,
            route: None,
            tx_hash: None,
            executed_price: None,
            error: None,
        }
    }
}
