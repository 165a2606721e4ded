//! Session handlers: password login, redirect-pair exchange, refresh, logout.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    dtos::auth::{ExchangeRequest, LoginRequest, LogoutRequest, RefreshRequest, SessionResponse},
    dtos::ErrorResponse,
    middleware::AuthUser,
    services::{route, Destination, Session, TokenResponse},
    utils::ValidatedJson,
    AppState,
};
use service_core::error::AppError;

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Email not confirmed", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .establisher
        .sign_in_with_password(&req.email, &req.password)
        .await?;

    let next = settle(&state, &session).await;

    Ok((StatusCode::OK, Json(SessionResponse::from_session(session, next))))
}

/// Establish a session from a redirect token pair
#[utoipa::path(
    post,
    path = "/auth/session/exchange",
    request_body = ExchangeRequest,
    responses(
        (status = 200, description = "Session established", body = SessionResponse),
        (status = 401, description = "Session exchange failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn exchange(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ExchangeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .establisher
        .establish_from_redirect(&req.access_token, &req.refresh_token)
        .await?;

    let next = settle(&state, &session).await;

    Ok((StatusCode::OK, Json(SessionResponse::from_session(session, next))))
}

/// Refresh the access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = TokenResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = state.establisher.refresh(&req.refresh_token).await?;
    Ok((StatusCode::OK, Json(tokens)))
}

/// Logout and invalidate tokens
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out successfully"),
        (status = 401, description = "Invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claims = user.0;
    state
        .establisher
        .logout(&claims.jti, claims.exp, &req.refresh_token)
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    ))
}

/// Post-authentication settling shared by every session entry point: run the
/// profile synchronizer, then route. Neither step may block the login.
async fn settle(state: &AppState, session: &Session) -> Destination {
    state.synchronizer.sync(session).await;

    match state.db.find_profile_by_user_id(session.user_id).await {
        Ok(Some(profile)) => route(&profile),
        Ok(None) => Destination::JoinOrganization,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %session.user_id, "Profile lookup failed after login");
            Destination::JoinOrganization
        }
    }
}
