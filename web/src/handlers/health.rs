//! Health check endpoints.
//!
//! Used by load balancers and orchestrators: `/health` for liveness,
//! `/ready` for readiness (storage reachable).

use axum::{Json, extract::State, http::StatusCode};
use marketplace_core::ports::CheckoutStore;
use serde::Serialize;
use std::sync::Arc;

/// Liveness probe. Does not touch dependencies.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    /// `ready` or `unavailable`
    pub status: &'static str,
    /// Why the service is not ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Readiness probe: 200 when storage answers a ping, 503 otherwise.
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness_check(
    State(store): State<Arc<dyn CheckoutStore>>,
) -> (StatusCode, Json<Readiness>) {
    match store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ready",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "unavailable",
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_testing::InMemoryStore;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_readiness_follows_storage() {
        let store = InMemoryStore::new();
        let shared: Arc<dyn CheckoutStore> = Arc::new(store.clone());

        let (status, Json(body)) = readiness_check(State(Arc::clone(&shared))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ready");

        store.set_unavailable(true);
        let (status, Json(body)) = readiness_check(State(shared)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.error.is_some());
    }
}
