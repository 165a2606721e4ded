//! Registration and email-confirmation handlers.
//!
//! Registration is the manual fallback path for users whose invitation went
//! stale; a join link's token can ride along and is consumed on first sign-in.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    dtos::auth::{RegisterRequest, RegisterResponse, ResendVerificationRequest, VerifyQuery, VerifyResponse},
    dtos::ErrorResponse,
    models::{Account, VerificationToken},
    utils::{generate_token, hash_password, hash_token, Password, ValidatedJson},
    AppState,
};
use service_core::error::AppError;

/// Register a new account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account registered, verification email sent", body = RegisterResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if state.db.find_account_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Email already registered"
        )));
    }

    let password_hash = hash_password(&Password::new(req.password.clone()))
        .map_err(AppError::InternalError)?;

    let mut account = Account::new(
        req.email.clone(),
        password_hash.into_string(),
        req.full_name,
    );
    if let Some(token) = req.invite_token.as_deref() {
        account = account.with_invite_token(token);
    }

    state.db.insert_account(&account).await?;

    tracing::info!(user_id = %account.user_id, "Account registered");

    let token = generate_token();
    let verification = VerificationToken::new(
        account.user_id,
        hash_token(&token),
        state.config.invite.verification_expiry_hours,
    );
    state.db.insert_verification_token(&verification).await?;

    state
        .email
        .send_verification_email(&req.email, &token, &state.config.invite.base_url)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: account.user_id,
            message: "Registration successful. Please check your email to verify your account."
                .to_string(),
        }),
    ))
}

/// Verify an account email
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Email verified successfully", body = VerifyResponse),
        (status = 400, description = "Token expired", body = ErrorResponse),
        (status = 404, description = "Invalid token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(req): Query<VerifyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let token_hash = hash_token(&req.token);

    let verification = state
        .db
        .find_verification_token_by_hash(&token_hash)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invalid verification token")))?;

    if verification.is_expired() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Verification token expired"
        )));
    }

    state.db.confirm_account_email(verification.user_id).await?;

    // Used tokens are deleted; failure here only means an extra valid link
    if let Err(e) = state
        .db
        .delete_verification_token(verification.verification_id)
        .await
    {
        tracing::warn!(error = %e, "Failed to delete used verification token");
    }

    tracing::info!(user_id = %verification.user_id, "Email verified");

    Ok((
        StatusCode::OK,
        Json(VerifyResponse {
            message: "Email verified successfully".to_string(),
        }),
    ))
}

/// Resend the verification email
#[utoipa::path(
    post,
    path = "/auth/verify/resend",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Verification email sent if the account exists", body = VerifyResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResendVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Same response whether or not the account exists
    if let Some(account) = state.db.find_account_by_email(&req.email).await? {
        if !account.is_email_confirmed() {
            let token = generate_token();
            let verification = VerificationToken::new(
                account.user_id,
                hash_token(&token),
                state.config.invite.verification_expiry_hours,
            );
            state.db.insert_verification_token(&verification).await?;

            state
                .email
                .send_verification_email(&req.email, &token, &state.config.invite.base_url)
                .await?;

            tracing::info!(user_id = %account.user_id, "Verification email resent");
        }
    }

    Ok((
        StatusCode::OK,
        Json(VerifyResponse {
            message: "If the account exists, a verification email has been sent.".to_string(),
        }),
    ))
}
