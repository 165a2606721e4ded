//! Profile handlers for the authenticated user.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dtos::ErrorResponse,
    middleware::AuthUser,
    models::profile::ProfileResponse,
    services::{route, Destination},
    AppState,
};
use service_core::error::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: ProfileResponse,
    pub next: Destination,
}

/// The authenticated user's profile plus the routed next screen.
#[utoipa::path(
    get,
    path = "/profiles/me",
    responses(
        (status = 200, description = "Profile and next destination", body = MeResponse),
        (status = 404, description = "Profile not created yet", body = ErrorResponse)
    ),
    tag = "Profiles",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_subject(&user.0.sub)?;

    let profile = state
        .db
        .find_profile_by_user_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Profile not found")))?;

    let next = route(&profile);

    Ok((
        StatusCode::OK,
        Json(MeResponse {
            profile: ProfileResponse::from(profile),
            next,
        }),
    ))
}

/// Mark the welcome screen as seen.
#[utoipa::path(
    post,
    path = "/profiles/me/welcome",
    responses(
        (status = 200, description = "Welcome flag set"),
        (status = 404, description = "Profile not created yet", body = ErrorResponse)
    ),
    tag = "Profiles",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_welcome_seen(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_subject(&user.0.sub)?;

    let updated = state.db.mark_profile_welcome_seen(user_id).await?;
    if !updated {
        return Err(AppError::NotFound(anyhow::anyhow!("Profile not found")));
    }

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Welcome screen marked as seen" })),
    ))
}

fn parse_subject(sub: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(sub)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed subject claim")))
}
