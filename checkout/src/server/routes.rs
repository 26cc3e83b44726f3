//! Router configuration for the checkout service.

use super::state::AppState;
use crate::api::{purchases, reservations, webhooks};
use axum::{
    Router,
    routing::{get, post},
};
use marketplace_web::correlation_id_layer;
use marketplace_web::handlers::{health_check, readiness_check};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/health`, `/ready`: probes, no authentication
/// - `/api/*`: purchaser endpoints, session header required
/// - `/webhooks/*`: provider callbacks, signature authenticated
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/purchases", post(purchases::create_purchase))
        .route("/reservations/:id", get(reservations::get_reservation));

    let webhook_routes = Router::new().route("/razorpay", post(webhooks::razorpay_webhook));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .nest("/webhooks", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
