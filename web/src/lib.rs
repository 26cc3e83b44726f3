//! Axum integration for marketplace checkout.
//!
//! Shared HTTP plumbing for the checkout service:
//!
//! - [`AppError`]: maps the checkout and webhook error taxonomy onto status
//!   codes and a `{code, message}` JSON body
//! - [`extractors`]: correlation id and the explicit session context
//! - [`middleware`]: correlation id propagation and per-request spans
//! - [`handlers`]: liveness and readiness probes
//!
//! # Example
//!
//! ```ignore
//! use marketplace_web::{AppError, Session};
//! use axum::{Router, routing::post, Json};
//!
//! async fn purchase(
//!     State(state): State<AppState>,
//!     Session(ctx): Session,
//!     Json(request): Json<PurchaseBody>,
//! ) -> Result<Json<CheckoutResponse>, AppError> {
//!     let receipt = state.orchestrator.purchase(&ctx, request.into()).await?;
//!     Ok(Json(receipt.into()))
//! }
//!
//! let app = Router::new()
//!     .route("/api/purchases", post(purchase))
//!     .layer(correlation_id_layer())
//!     .with_state(app_state);
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{CorrelationId, Session, SessionHeader};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
