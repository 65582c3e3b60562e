//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request correlation id (extracted or generated)
//! - [`Actor`]: the verified caller identity set by the upstream gateway
//!
//! # Examples
//!
//! ```ignore
//! use fleetops_web::extractors::{Actor, CorrelationId};
//!
//! async fn handler(
//!     State(state): State<AppState>,
//!     Actor(actor): Actor,
//!     correlation_id: CorrelationId,
//! ) -> Result<Json<Cargo>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, tenant_id = %actor.tenant_id, "Processing request");
//!     // ...
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use fleetops_core::{ActorContext, TenantId, UserId};
use uuid::Uuid;

/// Header carrying the caller's tenant.
pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Correlation ID for request tracing.
///
/// Prefers the id stored by the correlation middleware, then the
/// `X-Correlation-ID` header, and generates a UUID v4 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .or_else(|| {
                parts
                    .headers
                    .get(CORRELATION_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| Uuid::parse_str(s).ok())
            })
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Verified caller identity.
///
/// Authentication happens at the gateway, which forwards the tenant, user and
/// role as headers. A request missing any of them, or carrying a malformed
/// id, is rejected with 401.
///
/// ```ignore
/// async fn handler(Actor(actor): Actor) -> String {
///     format!("tenant {}", actor.tenant_id)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub ActorContext);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Self)
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<ActorContext, AppError> {
    let tenant_id = header_id(headers, TENANT_ID_HEADER)?;
    let user_id = header_id(headers, USER_ID_HEADER)?;
    let role = header_str(headers, USER_ROLE_HEADER)?;

    Ok(ActorContext::new(
        TenantId::new(tenant_id),
        UserId::new(user_id),
        role,
    ))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::unauthorized(format!("Missing {name} header")))
}

fn header_id(headers: &HeaderMap, name: &str) -> Result<i64, AppError> {
    header_str(headers, name)?
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::unauthorized(format!("Invalid {name} header")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_actor_from_gateway_headers() {
        let map = headers(&[
            (TENANT_ID_HEADER, "7"),
            (USER_ID_HEADER, "42"),
            (USER_ROLE_HEADER, "dispatcher"),
        ]);

        let actor = actor_from_headers(&map).unwrap();
        assert_eq!(actor.tenant_id, TenantId::new(7));
        assert_eq!(actor.user_id, UserId::new(42));
        assert_eq!(actor.role, "dispatcher");
    }

    #[test]
    fn test_missing_tenant_is_unauthorized() {
        let map = headers(&[(USER_ID_HEADER, "42"), (USER_ROLE_HEADER, "admin")]);

        let err = actor_from_headers(&map).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_malformed_ids_are_unauthorized() {
        for tenant in ["abc", "0", "-3", ""] {
            let mut map = headers(&[(USER_ID_HEADER, "42"), (USER_ROLE_HEADER, "admin")]);
            map.insert(TENANT_ID_HEADER, HeaderValue::from_static(tenant));

            let err = actor_from_headers(&map).unwrap_err();
            assert_eq!(err.code(), "UNAUTHORIZED", "tenant header {tenant:?}");
        }
    }

    #[test]
    fn test_missing_role_is_unauthorized() {
        let map = headers(&[(TENANT_ID_HEADER, "1"), (USER_ID_HEADER, "42")]);

        assert!(actor_from_headers(&map).is_err());
    }
}
