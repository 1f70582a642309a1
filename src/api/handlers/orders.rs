use axum::{extract::State, http::StatusCode, Json};
use tracing::{error, info};

use crate::api::types::{ErrorResponse, SubmitOrderResponse};
use crate::api::AppState;
use crate::domain::{Order, SubmitOrderRequest};
use crate::error::SwaplineError;
use crate::validation::validate_submission;

/// POST /orders/execute
///
/// Validates the submission, assigns an order id, durably enqueues the
/// job, and returns immediately; execution progress streams over
/// `/ws/orders/:order_id`. Validation failures enqueue nothing and
/// record no events.
pub async fn execute_order(
    State(state): State<AppState>,
    Json(request): Json<SubmitOrderRequest>,
) -> std::result::Result<Json<SubmitOrderResponse>, (StatusCode, Json<ErrorResponse>)> {
    if let Err(e) = validate_submission(&request) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        ));
    }

    let order = Order::new(request);
    let order_id = order.order_id;

    match state.queue.submit(order).await {
        Ok(()) => {
            info!(%order_id, "order accepted");
            Ok(Json(SubmitOrderResponse { order_id }))
        }
        Err(e @ SwaplineError::QueueIntake(_)) => {
            error!(%order_id, "order intake failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
        Err(e) => {
            error!(%order_id, "unexpected submission error: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
