//! Organization admin handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    dtos::ErrorResponse,
    models::organization::{
        CreateOrganizationRequest, Organization, OrganizationResponse, RenameOrganizationRequest,
    },
    AppState,
};
use service_core::error::AppError;

/// Create an organization.
#[utoipa::path(
    post,
    path = "/organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = OrganizationResponse),
        (status = 400, description = "Empty name", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("admin_api_key" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_organization(
    State(state): State<AppState>,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.org_name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Organization name must not be empty"
        )));
    }

    let org = Organization::new(req.org_name.trim().to_string());
    state.db.insert_organization(&org).await?;

    tracing::info!(organization_id = %org.organization_id, "Organization created");

    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse::from(org)),
    ))
}

/// Rename an organization. Drops the cached display name.
#[utoipa::path(
    patch,
    path = "/organizations/{org_id}",
    params(("org_id" = Uuid, Path, description = "Organization id")),
    request_body = RenameOrganizationRequest,
    responses(
        (status = 200, description = "Organization renamed", body = OrganizationResponse),
        (status = 404, description = "Organization not found", body = ErrorResponse)
    ),
    tag = "Organizations",
    security(("admin_api_key" = []))
)]
#[tracing::instrument(skip_all, fields(organization_id = %org_id))]
pub async fn rename_organization(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(req): Json<RenameOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.org_name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Organization name must not be empty"
        )));
    }

    let renamed = state
        .db
        .rename_organization(org_id, req.org_name.trim())
        .await?;
    if !renamed {
        return Err(AppError::NotFound(anyhow::anyhow!("Organization not found")));
    }

    // Cached display names are stale after any mutation
    state.orgs.invalidate(org_id);

    let org = state
        .db
        .find_organization_by_id(org_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))?;

    Ok((StatusCode::OK, Json(OrganizationResponse::from(org))))
}
