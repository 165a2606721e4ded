//! Bearer-token authentication middleware.
//!
//! Validates the access token, checks the revocation list, and parks the
//! claims in the request extensions for the `AuthUser` extractor. The
//! blacklist check fails closed: an unreachable blacklist rejects the
//! request instead of trusting the token.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};

use crate::{dtos::ErrorResponse, services::AccessTokenClaims, AppState};

type Rejection = (StatusCode, Json<ErrorResponse>);

fn deny(status: StatusCode, error: &str) -> Rejection {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, Rejection> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            deny(
                StatusCode::UNAUTHORIZED,
                "Missing or invalid Authorization header",
            )
        })?;

    let claims = state
        .jwt
        .validate_access_token(bearer)
        .map_err(|_| deny(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

    let revoked = state.redis.is_blacklisted(&claims.jti).await.map_err(|e| {
        tracing::error!(error = %e, "Blacklist lookup failed; rejecting token");
        deny(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })?;

    if revoked {
        return Err(deny(StatusCode::UNAUTHORIZED, "Token has been revoked"));
    }

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor handing the verified claims to a handler.
pub struct AuthUser(pub AccessTokenClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only reachable on routes behind auth_middleware; absence means a
        // route wiring mistake, not a client error.
        parts
            .extensions
            .get::<AccessTokenClaims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                deny(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Auth claims missing from request extensions",
                )
            })
    }
}
