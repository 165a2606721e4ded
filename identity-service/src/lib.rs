//! Identity, invitation and organization-join service.
//!
//! The join workflow's components (token validation, session establishment,
//! profile synchronization, invitation processing, flow routing) are wired
//! once into `AppState`; `build_router` mounts them behind the service's
//! HTTP surface.

pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{IdentityConfig, SecurityConfig};
use crate::services::{
    Database, EmailProvider, InvitationProcessor, JoinFlow, JwtService, OrgDirectory,
    ProfileSynchronizer, SessionEstablisher, TokenBlacklist, TokenValidator,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::{
    create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::well_known::jwks,
        handlers::auth::registration::register,
        handlers::auth::registration::verify_email,
        handlers::auth::registration::resend_verification,
        handlers::auth::session::login,
        handlers::auth::session::exchange,
        handlers::auth::session::refresh,
        handlers::auth::session::logout,
        handlers::invitation::create_invitation,
        handlers::invitation::get_invitation,
        handlers::invitation::accept_invitation,
        handlers::join::join,
        handlers::profile::get_me,
        handlers::profile::mark_welcome_seen,
        handlers::organization::create_organization,
        handlers::organization::rename_organization,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::VerifyResponse,
            dtos::auth::ResendVerificationRequest,
            dtos::auth::LoginRequest,
            dtos::auth::ExchangeRequest,
            dtos::auth::RefreshRequest,
            dtos::auth::LogoutRequest,
            dtos::auth::SessionResponse,
            dtos::auth::JoinRequest,
            dtos::auth::JoinResponse,
            handlers::invitation::ValidateInvitationResponse,
            handlers::invitation::AcceptInvitationResponse,
            handlers::profile::MeResponse,
            models::invitation::CreateInvitationRequest,
            models::invitation::CreateInvitationResponse,
            models::organization::CreateOrganizationRequest,
            models::organization::RenameOrganizationRequest,
            models::organization::OrganizationResponse,
            models::profile::ProfileResponse,
            models::profile::MemberRole,
            services::TokenResponse,
            services::Destination,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and session management"),
        (name = "Invitations", description = "Invitation lifecycle and organization join"),
        (name = "Profiles", description = "The authenticated user's profile and routing"),
        (name = "Organizations", description = "Administrative organization management"),
        (name = "Well-Known", description = "Public service metadata"),
        (name = "Observability", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "admin_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-admin-api-key"))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub db: Database,
    pub email: Arc<dyn EmailProvider>,
    pub jwt: JwtService,
    pub redis: Arc<dyn TokenBlacklist>,
    pub orgs: Arc<OrgDirectory>,
    pub validator: TokenValidator,
    pub establisher: SessionEstablisher,
    pub synchronizer: ProfileSynchronizer,
    pub processor: InvitationProcessor,
    pub join_flow: JoinFlow,
    pub login_rate_limiter: IpRateLimiter,
    pub join_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the flow components over shared infrastructure.
    pub fn new(
        config: IdentityConfig,
        db: Database,
        email: Arc<dyn EmailProvider>,
        jwt: JwtService,
        redis: Arc<dyn TokenBlacklist>,
    ) -> Self {
        let orgs = Arc::new(OrgDirectory::new());

        let validator = TokenValidator::new(db.clone(), orgs.clone());
        let establisher = SessionEstablisher::new(db.clone(), jwt.clone(), redis.clone());
        let synchronizer = ProfileSynchronizer::new(db.clone());
        let processor = InvitationProcessor::new(db.clone());
        let join_flow = JoinFlow::new(
            db.clone(),
            validator.clone(),
            establisher.clone(),
            synchronizer.clone(),
            processor.clone(),
        );

        let limits = &config.rate_limit;
        let login_rate_limiter =
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds);
        let join_rate_limiter =
            create_ip_rate_limiter(limits.join_attempts, limits.join_window_seconds);
        let ip_rate_limiter =
            create_ip_rate_limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        Self {
            config,
            db,
            email,
            jwt,
            redis,
            orgs,
            validator,
            establisher,
            synchronizer,
            processor,
            join_flow,
            login_rate_limiter,
            join_rate_limiter,
            ip_rate_limiter,
        }
    }
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-admin-api-key"),
        ])
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let admin_routes = Router::new()
        .route(
            "/organizations",
            post(handlers::organization::create_organization),
        )
        .route(
            "/organizations/:org_id",
            patch(handlers::organization::rename_organization),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let authed_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/invitations",
            post(handlers::invitation::create_invitation),
        )
        .route(
            "/invitations/:token/accept",
            post(handlers::invitation::accept_invitation),
        )
        .route("/profiles/me", get(handlers::profile::get_me))
        .route(
            "/profiles/me/welcome",
            post(handlers::profile::mark_welcome_seen),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Credential-bearing entry points carry their own stricter limiters.
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));
    let join_route = Router::new()
        .route("/auth/join", post(handlers::join::join))
        .layer(from_fn_with_state(
            state.join_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/.well-known/jwks.json", get(handlers::well_known::jwks));

    if state.config.swagger.serves_ui(&state.config.environment) {
        app = app
            .merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        // The document itself stays available for programmatic clients.
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let global_limiter = state.ip_rate_limiter.clone();
    let cors = cors_layer(&state.config.security);

    let app = app
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/verify", get(handlers::auth::verify_email))
        .route(
            "/auth/verify/resend",
            post(handlers::auth::resend_verification),
        )
        .route("/auth/session/exchange", post(handlers::auth::exchange))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/invitations/:token",
            get(handlers::invitation::get_invitation),
        )
        .merge(login_route)
        .merge(join_route)
        .merge(admin_routes)
        .merge(authed_routes)
        .with_state(state)
        .layer(from_fn_with_state(global_limiter, ip_rate_limit_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

/// Service health: both backing stores must answer.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "PostgreSQL health check failed");
        AppError::from(e)
    })?;

    state.redis.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::InternalError(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up",
            "redis": "up"
        }
    })))
}
