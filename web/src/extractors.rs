//! Custom Axum extractors.
//!
//! - `CorrelationId`: the request's correlation id (set by the middleware, or
//!   read from the header, or freshly generated)
//! - `Session`: explicit [`RequestContext`] resolved from the header the
//!   upstream session layer injects
//!
//! # Examples
//!
//! ```ignore
//! use marketplace_web::extractors::{CorrelationId, Session};
//!
//! async fn handler(
//!     correlation_id: CorrelationId,
//!     Session(ctx): Session,
//! ) -> Result<Json<Response>, AppError> {
//!     let user_id = ctx.require_user()?;
//!     tracing::info!(correlation_id = %correlation_id.0, %user_id, "Processing request");
//!     Ok(Json(response))
//! }
//! ```

use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use marketplace_core::RequestContext;
use marketplace_core::types::UserId;
use uuid::Uuid;

/// Correlation ID for request tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Name of the header carrying the authenticated user id.
///
/// The session layer in front of this service authenticates the caller and
/// forwards the user id; the application state exposes the configured name
/// through [`FromRef`].
#[derive(Debug, Clone)]
pub struct SessionHeader(pub String);

impl Default for SessionHeader {
    fn default() -> Self {
        Self("X-User-Id".to_string())
    }
}

/// Caller identity as an explicit [`RequestContext`].
///
/// Never rejects: a missing or unparseable user id yields an anonymous
/// context, and the orchestrator decides whether that is acceptable.
#[derive(Debug, Clone, Copy)]
pub struct Session(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    SessionHeader: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let SessionHeader(header) = SessionHeader::from_ref(state);

        let ctx = parts
            .headers
            .get(header.as_str())
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map_or_else(RequestContext::anonymous, |uuid| {
                RequestContext::authenticated(UserId::from_uuid(uuid))
            });

        Ok(Self(ctx))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .expect("Valid request");

        let (mut parts, _) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let from_middleware = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();

        let (mut parts, _) = req.into_parts();
        parts.extensions.insert(CorrelationId(from_middleware));
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(correlation_id.0, from_middleware);
    }

    #[tokio::test]
    async fn test_session_with_user_header() {
        let user = Uuid::new_v4();
        let req = Request::builder()
            .header("x-user-id", user.to_string())
            .body(())
            .unwrap();

        let (mut parts, _) = req.into_parts();
        let Session(ctx) = Session::from_request_parts(&mut parts, &SessionHeader::default())
            .await
            .unwrap();

        assert!(ctx.is_authenticated);
        assert_eq!(ctx.requestor_id, Some(UserId::from_uuid(user)));
    }

    #[tokio::test]
    async fn test_session_custom_header_and_garbage() {
        let state = SessionHeader("X-Authenticated-User".to_string());

        let req = Request::builder()
            .header("X-Authenticated-User", "not-a-uuid")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let Session(ctx) = Session::from_request_parts(&mut parts, &state).await.unwrap();
        assert!(!ctx.is_authenticated);

        // The default header is ignored when another one is configured.
        let req = Request::builder()
            .header("X-User-Id", Uuid::new_v4().to_string())
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let Session(ctx) = Session::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(ctx, RequestContext::anonymous());
    }
}
