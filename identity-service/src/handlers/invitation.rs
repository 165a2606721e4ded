//! Invitation handlers: create, validate by token, accept.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    dtos::ErrorResponse,
    middleware::AuthUser,
    models::invitation::{CreateInvitationRequest, CreateInvitationResponse},
    models::Invitation,
    services::{ServiceError, TokenValidation},
    utils::{generate_token, hash_token, ValidatedJson},
    AppState,
};
use service_core::error::AppError;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ValidateQuery {
    /// Email to check the invitation against, if known.
    pub email: Option<String>,
}

/// Body of the validation endpoint. Always returned with status 200: an
/// unusable token is an answer, not an error.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateInvitationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Response of the accept operation.
#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptInvitationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Create a new invitation and email the join link.
#[utoipa::path(
    post,
    path = "/invitations",
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation created and emailed", body = CreateInvitationResponse),
        (status = 403, description = "Inviter may not invite into this organization", body = ErrorResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Invitations",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user), fields(organization_id = %req.organization_id))]
pub async fn create_invitation(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<CreateInvitationResponse>), AppError> {
    let inviter_id = Uuid::parse_str(&user.0.sub)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed subject claim")))?;

    // The inviter must belong to the target organization with an inviting role
    let inviter = state
        .db
        .find_profile_by_user_id(inviter_id)
        .await?
        .ok_or_else(|| AppError::Forbidden(anyhow::anyhow!("Inviter has no profile")))?;

    if inviter.organization_id != Some(req.organization_id) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Inviter does not belong to the target organization"
        )));
    }
    if !inviter.role().map(|r| r.can_invite()).unwrap_or(false) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Inviter role may not create invitations"
        )));
    }

    let org = state
        .orgs
        .get_or_load(&state.db, req.organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))?;

    let token = generate_token();
    let expiry_hours = req
        .expires_in_hours
        .unwrap_or(state.config.invite.expiry_hours);

    let invitation = Invitation::new(
        req.organization_id,
        req.email.clone(),
        req.role,
        hash_token(&token),
        expiry_hours,
        inviter_id,
    );
    state.db.insert_invitation(&invitation).await?;

    let invite_url = format!("{}/join?token={}", state.config.invite.base_url, token);

    state
        .email
        .send_invitation_email(
            &req.email,
            &org.org_name,
            &invitation.role_code,
            &token,
            &state.config.invite.base_url,
        )
        .await?;

    tracing::info!(
        email = %req.email,
        invitation_id = %invitation.invitation_id,
        "Invitation created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateInvitationResponse {
            invitation_id: invitation.invitation_id,
            invite_token: token,
            invite_url,
            expires_utc: invitation.expires_utc,
        }),
    ))
}

/// Validate an invitation token for display.
#[utoipa::path(
    get,
    path = "/invitations/{token}",
    params(
        ("token" = String, Path, description = "Opaque invitation token"),
        ValidateQuery
    ),
    responses(
        (status = 200, description = "Validation outcome, valid or not", body = ValidateInvitationResponse)
    ),
    tag = "Invitations"
)]
#[tracing::instrument(skip_all)]
pub async fn get_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<ValidateQuery>,
) -> Json<ValidateInvitationResponse> {
    match state
        .validator
        .validate(&token, query.email.as_deref())
        .await
    {
        TokenValidation::Valid {
            organization_id,
            organization_name,
            role,
        } => Json(ValidateInvitationResponse {
            valid: true,
            reason: None,
            organization_id: Some(organization_id),
            organization_name,
            role: Some(role),
        }),
        TokenValidation::Invalid { reason } => Json(ValidateInvitationResponse {
            valid: false,
            reason: Some(reason.reason().to_string()),
            organization_id: None,
            organization_name: None,
            role: None,
        }),
    }
}

/// Accept an invitation for the authenticated user.
#[utoipa::path(
    post,
    path = "/invitations/{token}/accept",
    params(("token" = String, Path, description = "Opaque invitation token")),
    responses(
        (status = 200, description = "Acceptance outcome; denials carry a message", body = AcceptInvitationResponse)
    ),
    tag = "Invitations",
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<AcceptInvitationResponse>, AppError> {
    let user_id = Uuid::parse_str(&user.0.sub)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed subject claim")))?;

    match state.processor.accept(user_id, &token).await {
        Ok(accepted) => Ok(Json(AcceptInvitationResponse {
            success: true,
            message: None,
            organization_id: Some(accepted.organization_id),
            role: Some(accepted.role_code),
        })),
        // Token-level denials are part of the operation's contract, not
        // transport errors.
        Err(
            e @ (ServiceError::TokenNotFound
            | ServiceError::TokenExpired
            | ServiceError::TokenAlreadyUsed
            | ServiceError::TokenEmailMismatch
            | ServiceError::InvitationAcceptFailed(_)),
        ) => Ok(Json(AcceptInvitationResponse {
            success: false,
            message: Some(denial_message(&e)),
            organization_id: None,
            role: None,
        })),
        Err(e) => Err(e.into()),
    }
}

fn denial_message(e: &ServiceError) -> String {
    match e {
        ServiceError::TokenNotFound => "invitation not found".to_string(),
        ServiceError::TokenExpired => "expired".to_string(),
        ServiceError::TokenAlreadyUsed => "already used".to_string(),
        ServiceError::TokenEmailMismatch => "email mismatch".to_string(),
        other => other.to_string(),
    }
}
