//! Public service metadata.

use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::AppState;
use service_core::error::AppError;

/// Published verification keys; cacheable since the pair rotates rarely.
#[utoipa::path(
    get,
    path = "/.well-known/jwks.json",
    responses(
        (status = 200, description = "Public JWKS returned")
    ),
    tag = "Well-Known"
)]
pub async fn jwks(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let document = state.jwt.get_jwks().map_err(AppError::InternalError)?;

    let headers = [
        (header::CONTENT_TYPE, "application/json"),
        (header::CACHE_CONTROL, "public, max-age=3600"),
    ];

    Ok((headers, Json(document)))
}
