//! Composite join-flow handler - the landing endpoint for emailed join links.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    dtos::auth::{JoinRequest, JoinResponse},
    dtos::ErrorResponse,
    services::{translate_redirect_error, JoinCredentials, LinkKind},
    utils::ValidatedJson,
    AppState,
};
use service_core::error::AppError;

/// Land an emailed join link: validate, authenticate, sync, accept, route.
#[utoipa::path(
    post,
    path = "/auth/join",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Flow settled; session, acceptance and next screen", body = JoinResponse),
        (status = 400, description = "Unusable invitation token or malformed request", body = ErrorResponse),
        (status = 401, description = "Authentication failed", body = ErrorResponse),
        (status = 403, description = "Email not confirmed", body = ErrorResponse),
        (status = 501, description = "Unsupported link kind", body = ErrorResponse)
    ),
    tag = "Invitations"
)]
#[tracing::instrument(skip_all)]
pub async fn join(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<JoinRequest>,
) -> Result<impl IntoResponse, AppError> {
    // A failed provider redirect arrives as error params instead of tokens.
    if req.error_code.is_some() || req.error_description.is_some() {
        let err = translate_redirect_error(
            req.error_code.as_deref(),
            req.error_description.as_deref().unwrap_or_default(),
        );
        return Err(err.into());
    }

    let kind = match req.kind.as_deref() {
        None => LinkKind::Invite,
        Some(s) => LinkKind::parse(s)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown link kind: {}", s)))?,
    };

    let credentials = match (&req.access_token, &req.refresh_token, &req.email, &req.password) {
        (Some(access_token), Some(refresh_token), _, _) => JoinCredentials::Redirect {
            access_token: access_token.clone(),
            refresh_token: refresh_token.clone(),
        },
        (_, _, Some(email), Some(password)) => JoinCredentials::Password {
            email: email.clone(),
            password: password.clone(),
        },
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Provide either a redirect token pair or email and password"
            )))
        }
    };

    let outcome = state
        .join_flow
        .run(kind, req.token.clone(), req.email.clone(), credentials)
        .await?;

    let (organization_id, role) = match &outcome.accepted {
        Some(accepted) => (
            Some(accepted.organization_id),
            Some(accepted.role_code.clone()),
        ),
        None => (None, None),
    };

    Ok((
        StatusCode::OK,
        Json(JoinResponse {
            user_id: outcome.session.user_id,
            email: outcome.session.email.clone(),
            tokens: outcome.session.tokens.clone(),
            organization_id,
            role,
            next: outcome.destination,
        }),
    ))
}
