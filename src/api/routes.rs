use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState, websocket::order_progress_handler};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration (the reference frontend is served separately)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Order intake
        .route("/orders/execute", post(handlers::execute_order))
        // Per-order live progress stream
        .route("/ws/orders/:order_id", get(order_progress_handler))
        // Liveness
        .route("/health", get(handlers::get_health))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
